use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use replyhint_core::domain::{TriggerEvent, TriggerKind};
use replyhint_core::errors::LifecycleError;
use replyhint_core::flows::{FlowEvent, FlowRun};
use tracing::{debug, info, warn};

use crate::delivery::advance;
use crate::worker::{Job, JobReceipt, SubmitError, SuggestionWorker};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// What the dispatcher did with a trigger. The platform gets the same
/// acknowledgement in every case.
#[derive(Debug)]
pub enum HandlerResult {
    Queued(JobReceipt),
    /// Required fields were missing; nothing was sent anywhere.
    Dropped(LifecycleError),
    Refused(SubmitError),
    Ignored,
}

impl HandlerResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued(_) => "queued",
            Self::Dropped(_) => "dropped",
            Self::Refused(_) => "refused",
            Self::Ignored => "ignored",
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn trigger_kind(&self) -> TriggerKind;
    async fn handle(&self, event: &TriggerEvent, ctx: &EventContext) -> HandlerResult;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<TriggerKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.trigger_kind(), Arc::new(handler));
    }

    /// Returns as soon as the work is queued; never waits on generation or
    /// posting.
    pub async fn dispatch(&self, event: &TriggerEvent, ctx: &EventContext) -> HandlerResult {
        let Some(handler) = self.handlers.get(&event.kind) else {
            debug!(
                event_name = "ingress.slack.unhandled",
                correlation_id = %ctx.correlation_id,
                trigger_kind = event.kind.as_str(),
                "no handler registered for trigger"
            );
            return HandlerResult::Ignored;
        };

        handler.handle(event, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Suggest on both message buttons and shortcuts, dismiss on the dismiss button.
pub fn default_dispatcher(worker: Arc<SuggestionWorker>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SuggestionHandler::new(TriggerKind::MessageAction, worker.clone()));
    dispatcher.register(SuggestionHandler::new(TriggerKind::Shortcut, worker.clone()));
    dispatcher.register(DismissHandler::new(worker));
    dispatcher
}

pub struct SuggestionHandler {
    kind: TriggerKind,
    worker: Arc<SuggestionWorker>,
}

impl SuggestionHandler {
    pub fn new(kind: TriggerKind, worker: Arc<SuggestionWorker>) -> Self {
        Self { kind, worker }
    }
}

#[async_trait]
impl EventHandler for SuggestionHandler {
    fn trigger_kind(&self) -> TriggerKind {
        self.kind
    }

    async fn handle(&self, event: &TriggerEvent, ctx: &EventContext) -> HandlerResult {
        let mut run = FlowRun::start(ctx.correlation_id.clone());

        let request = match event.suggestion_request() {
            Ok(request) => request,
            Err(error) => {
                advance(&mut run, FlowEvent::RequiredFieldMissing);
                let error = LifecycleError::from(error);
                warn!(
                    event_name = "suggestion.trigger.invalid",
                    correlation_id = %ctx.correlation_id,
                    trigger_kind = event.kind.as_str(),
                    error_class = error.class(),
                    error = %error,
                    "trigger dropped"
                );
                return HandlerResult::Dropped(error);
            }
        };
        advance(&mut run, FlowEvent::FieldsValidated);

        let channel_id = request.channel_id.clone();
        match self.worker.submit(Job::Suggest { request, run }) {
            Ok(receipt) => {
                info!(
                    event_name = "suggestion.trigger.accepted",
                    correlation_id = %ctx.correlation_id,
                    trigger_kind = event.kind.as_str(),
                    channel_id = %channel_id,
                    "suggestion job queued"
                );
                HandlerResult::Queued(receipt)
            }
            Err(error) => HandlerResult::Refused(error),
        }
    }
}

pub struct DismissHandler {
    worker: Arc<SuggestionWorker>,
}

impl DismissHandler {
    pub fn new(worker: Arc<SuggestionWorker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl EventHandler for DismissHandler {
    fn trigger_kind(&self) -> TriggerKind {
        TriggerKind::ButtonClick
    }

    async fn handle(&self, event: &TriggerEvent, ctx: &EventContext) -> HandlerResult {
        let request = match event.dismiss_request() {
            Ok(request) => request,
            Err(error) => {
                let error = LifecycleError::from(error);
                warn!(
                    event_name = "tracker.dismiss.invalid",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "dismiss click dropped"
                );
                return HandlerResult::Dropped(error);
            }
        };

        match self
            .worker
            .submit(Job::Dismiss { request, correlation_id: ctx.correlation_id.clone() })
        {
            Ok(receipt) => HandlerResult::Queued(receipt),
            Err(error) => HandlerResult::Refused(error),
        }
    }
}
