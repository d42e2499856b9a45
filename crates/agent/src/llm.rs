use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use replyhint_core::config::{LlmConfig, LlmProvider};
use replyhint_core::errors::GenerationError;
use thiserror::Error;

use crate::gemini::GeminiClient;
use crate::ollama::OllamaClient;

/// Turns a source message into reply suggestions. Callers only pass
/// non-empty text; implementations never retry.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, message_text: &str) -> Result<String, GenerationError>;

    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("llm provider `{provider}` requires an api key")]
    MissingApiKey { provider: &'static str },
    #[error("llm provider `{provider}` requires a base url")]
    MissingBaseUrl { provider: &'static str },
    #[error("could not build http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub fn build_generation_client(
    config: &LlmConfig,
) -> Result<Arc<dyn GenerationClient>, ClientBuildError> {
    let http = http_client(Duration::from_secs(config.timeout_secs))?;

    match config.provider {
        LlmProvider::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .ok_or(ClientBuildError::MissingApiKey { provider: "gemini" })?;
            let mut client = GeminiClient::new(http, api_key, config.model.clone());
            if let Some(base_url) = config.base_url.as_deref() {
                client = client.with_base_url(base_url);
            }
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .ok_or(ClientBuildError::MissingBaseUrl { provider: "ollama" })?;
            Ok(Arc::new(OllamaClient::new(http, base_url, config.model.clone())))
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Collapses provider output: trimmed, and empty text is an error rather than
/// something to post.
pub(crate) fn non_empty(text: String) -> Result<String, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn transport_error(error: &reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Transport(format!("request timed out: {error}"))
    } else {
        GenerationError::Transport(error.to_string())
    }
}

/// Keeps provider error bodies short enough for a single log line.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}
