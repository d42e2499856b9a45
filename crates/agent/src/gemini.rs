use async_trait::async_trait;
use reqwest::Client;
use replyhint_core::errors::GenerationError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::{non_empty, transport_error, truncate_body, GenerationClient};
use crate::prompt::build_prompt;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API, `models/{model}:generateContent`.
pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, GenerationError> {
        if let Some(reason) = self.prompt_feedback.and_then(|feedback| feedback.block_reason) {
            warn!(event_name = "suggestion.generation.blocked", block_reason = %reason, "prompt was blocked");
            return Err(GenerationError::EmptyResponse);
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(GenerationError::EmptyResponse);
        };
        if let Some(reason) = candidate.finish_reason.as_deref() {
            debug!(finish_reason = reason, "gemini candidate finished");
        }

        let text = candidate
            .content
            .map(|content| {
                content.parts.into_iter().filter_map(|part| part.text).collect::<String>()
            })
            .unwrap_or_default();
        non_empty(text)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, message_text: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_prompt(message_text) }],
            }],
        });

        debug!(model = %self.model, base_url = %self.base_url, "calling gemini generateContent");

        // Key travels in a header so it never appears in a logged URL.
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(&error))?;

        let status = response.status();
        let text = response.text().await.map_err(|error| transport_error(&error))?;
        if !status.is_success() {
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message: truncate_body(&text),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|error| GenerationError::MalformedResponse(error.to_string()))?;
        parsed.into_text()
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use replyhint_core::errors::GenerationError;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::GeminiClient;
    use crate::llm::{http_client, GenerationClient};
    use crate::test_support::serve;

    #[derive(Default)]
    struct Seen {
        api_key: Option<String>,
        body: Option<Value>,
    }

    fn client(base_url: &str) -> GeminiClient {
        let http = http_client(std::time::Duration::from_secs(5)).expect("http client");
        GeminiClient::new(http, SecretString::from("test-key"), "gemini-2.0-flash")
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn sends_prompt_with_key_header_and_joins_candidate_parts() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let router = Router::new()
            .route(
                "/models/gemini-2.0-flash:generateContent",
                post(|State(seen): State<Arc<Mutex<Seen>>>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let mut seen = seen.lock().await;
                    seen.api_key = headers
                        .get("x-goog-api-key")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_owned);
                    seen.body = Some(body);
                    Json(json!({
                        "candidates": [{
                            "content": { "parts": [
                                { "text": "1. プロフェッショナル：承知しました。\n" },
                                { "text": "2. カジュアル：了解！" }
                            ]},
                            "finishReason": "STOP"
                        }]
                    }))
                }),
            )
            .with_state(seen.clone());
        let base_url = serve(router).await;

        let text = client(&base_url).generate("リリースは金曜日で大丈夫？").await.expect("text");

        assert_eq!(text, "1. プロフェッショナル：承知しました。\n2. カジュアル：了解！");
        let seen = seen.lock().await;
        assert_eq!(seen.api_key.as_deref(), Some("test-key"));
        let prompt = seen.body.as_ref().expect("body")["contents"][0]["parts"][0]["text"]
            .as_str()
            .expect("prompt text")
            .to_owned();
        assert!(prompt.contains("リリースは金曜日で大丈夫？"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_provider_error() {
        let router = Router::new().route(
            "/models/gemini-2.0-flash:generateContent",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exhausted") }),
        );
        let base_url = serve(router).await;

        let error = client(&base_url).generate("hello").await.expect_err("429 must fail");

        assert_eq!(
            error,
            GenerationError::Provider { status: 429, message: "quota exhausted".to_owned() }
        );
    }

    #[tokio::test]
    async fn missing_candidates_is_an_empty_response() {
        let router = Router::new().route(
            "/models/gemini-2.0-flash:generateContent",
            post(|| async {
                Json(json!({ "candidates": [], "promptFeedback": { "blockReason": "SAFETY" } }))
            }),
        );
        let base_url = serve(router).await;

        let error = client(&base_url).generate("hello").await.expect_err("blocked prompt");

        assert_eq!(error, GenerationError::EmptyResponse);
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let router = Router::new().route(
            "/models/gemini-2.0-flash:generateContent",
            post(|| async { "<html>gateway</html>" }),
        );
        let base_url = serve(router).await;

        let error = client(&base_url).generate("hello").await.expect_err("html must fail");

        assert!(matches!(error, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let error = client("http://127.0.0.1:1").generate("hello").await.expect_err("no server");

        assert!(matches!(error, GenerationError::Transport(_)));
    }
}
