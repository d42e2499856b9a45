//! Slack side of replyhint: turns interaction payloads into suggestion jobs and
//! posts the results back privately.
//!
//! - **Signatures** (`signature`) - `v0` HMAC check on every inbound request
//! - **Payloads** (`payload`) - form or JSON body into a `TriggerEvent`
//! - **Events** (`events`) - `EventDispatcher` with one handler per trigger kind
//! - **Worker** (`worker`) - bounded queue and task pool off the request path
//! - **Delivery** (`delivery`) - generate, render, post, track; dismiss
//! - **Block Kit** (`blocks`) - message builders and the suggestion layout
//! - **Web API** (`api`) - `chat.postEphemeral` / `chat.postMessage`
//!
//! # Flow
//!
//! ```text
//! POST /slack/events → verify → parse → EventDispatcher → SuggestionWorker::submit → 200
//!                                                   ↓
//!                      GenerationClient → render_suggestions → post_ephemeral → NotificationStore
//! ```

pub mod api;
pub mod blocks;
pub mod delivery;
pub mod events;
pub mod payload;
pub mod signature;
pub mod worker;

pub use api::{PostedMessage, SlackApi, SlackWebClient};
pub use delivery::{DeliveryOutcome, SuggestionPipeline};
pub use events::{default_dispatcher, EventContext, EventDispatcher, HandlerResult};
pub use payload::{parse_request, InboundRequest, PayloadError};
pub use signature::{SignatureError, SignatureVerifier};
pub use worker::{Job, JobReceipt, SubmitError, SuggestionWorker};
