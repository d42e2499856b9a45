//! Generation side of replyhint: turns a Slack message into reply suggestions.
//!
//! - `prompt` holds the fixed template that asks for three toned replies.
//! - `llm` defines the `GenerationClient` seam and picks a provider from config.
//! - `gemini` and `ollama` are the HTTP providers behind that seam.
//!
//! Providers never retry. A failed call surfaces as `GenerationError` and the
//! caller decides what the user sees.

pub mod gemini;
pub mod llm;
pub mod ollama;
pub mod prompt;

pub use gemini::GeminiClient;
pub use llm::{build_generation_client, ClientBuildError, GenerationClient};
pub use ollama::OllamaClient;
pub use prompt::build_prompt;
