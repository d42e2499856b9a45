use async_trait::async_trait;
use reqwest::Client;
use replyhint_core::errors::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{non_empty, transport_error, truncate_body, GenerationClient};
use crate::prompt::build_prompt;

/// Local Ollama daemon via `/api/generate`, non-streaming.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(http: Client, base_url: &str, model: impl Into<String>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), model: model.into() }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, message_text: &str) -> Result<String, GenerationError> {
        let request =
            GenerateRequest { model: &self.model, prompt: build_prompt(message_text), stream: false };
        debug!(model = %self.model, base_url = %self.base_url, "calling ollama generate");

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error(&error))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| transport_error(&error))?;
        if !status.is_success() {
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|error| GenerationError::MalformedResponse(error.to_string()))?;
        non_empty(parsed.response)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}
