use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use replyhint_core::errors::DeliveryError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::blocks::MessageTemplate;

pub const POST_EPHEMERAL: &str = "chat.postEphemeral";
pub const POST_MESSAGE: &str = "chat.postMessage";
pub const RESPONSE_URL: &str = "response_url";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_ts: Option<String>,
}

/// Outbound half of the Slack Web API that the suggestion flow needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Posts a message only `user_id` can see.
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, DeliveryError>;

    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<PostedMessage, DeliveryError>;

    /// Removes the message an interaction came from. Ephemeral messages can
    /// only be deleted this way.
    async fn delete_original(&self, response_url: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
    message_ts: Option<String>,
}

pub struct SlackWebClient {
    http: Client,
    bot_token: SecretString,
    base_url: String,
}

impl SlackWebClient {
    pub fn new(
        bot_token: SecretString,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, bot_token, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    async fn call(&self, method: &'static str, body: &Value) -> Result<ApiResponse, DeliveryError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|error| DeliveryError::Transport { method, message: error.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status { method, status: status.as_u16() });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|error| DeliveryError::Transport { method, message: error.to_string() })?;
        if !parsed.ok {
            return Err(DeliveryError::Api {
                method,
                error: parsed.error.unwrap_or_else(|| "unknown_error".to_owned()),
            });
        }

        debug!(method, "slack api call succeeded");
        Ok(parsed)
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<PostedMessage, DeliveryError> {
        let mut body = json!({
            "channel": channel_id,
            "user": user_id,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = Value::String(thread_ts.to_owned());
        }

        let response = self.call(POST_EPHEMERAL, &body).await?;
        Ok(PostedMessage { message_ts: response.message_ts })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<PostedMessage, DeliveryError> {
        let mut body = json!({ "channel": channel_id, "text": text });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = Value::String(thread_ts.to_owned());
        }

        let response = self.call(POST_MESSAGE, &body).await?;
        Ok(PostedMessage { message_ts: response.ts })
    }

    async fn delete_original(&self, response_url: &str) -> Result<(), DeliveryError> {
        // response_url carries its own authorization; no bearer token.
        let response = self
            .http
            .post(response_url)
            .json(&json!({ "delete_original": true }))
            .send()
            .await
            .map_err(|error| DeliveryError::Transport {
                method: RESPONSE_URL,
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status { method: RESPONSE_URL, status: status.as_u16() });
        }

        debug!(method = RESPONSE_URL, "original message deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use replyhint_core::domain::NotificationId;
    use replyhint_core::errors::DeliveryError;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    use super::{SlackApi, SlackWebClient};
    use crate::blocks::render_suggestions;

    #[derive(Default)]
    struct Recorded {
        calls: Vec<(String, Option<String>, Value)>,
    }

    async fn fake_slack(reply: Value, status: StatusCode) -> (String, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let router = Router::new()
            .route(
                "/api/{method}",
                post(
                    move |State(recorded): State<Arc<Mutex<Recorded>>>,
                          Path(method): Path<String>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|value| value.to_str().ok())
                                .map(str::to_owned);
                            recorded.lock().await.calls.push((method, auth, body));
                            (status, Json(reply)).into_response()
                        }
                    },
                ),
            )
            .with_state(recorded.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake slack");
        });
        (format!("http://{address}/api"), recorded)
    }

    fn client(base_url: &str) -> SlackWebClient {
        SlackWebClient::new(SecretString::from("xoxb-test"), base_url, Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn post_ephemeral_sends_blocks_thread_and_bearer_token() {
        let (base_url, recorded) =
            fake_slack(json!({ "ok": true, "message_ts": "1730000003.0001" }), StatusCode::OK).await;
        let message = render_suggestions("body", Some(&NotificationId::from("C1:1.0:5:0")));

        let posted = client(&base_url)
            .post_ephemeral("C1", "U1", Some("1730000000.0001"), &message)
            .await
            .expect("posted");

        assert_eq!(posted.message_ts.as_deref(), Some("1730000003.0001"));
        let recorded = recorded.lock().await;
        let (method, auth, body) = &recorded.calls[0];
        assert_eq!(method, "chat.postEphemeral");
        assert_eq!(auth.as_deref(), Some("Bearer xoxb-test"));
        assert_eq!(body["channel"], "C1");
        assert_eq!(body["user"], "U1");
        assert_eq!(body["thread_ts"], "1730000000.0001");
        assert_eq!(body["blocks"].as_array().map(Vec::len), Some(3));
        assert!(body["text"].as_str().is_some_and(|text| text.ends_with("body")));
    }

    #[tokio::test]
    async fn post_message_omits_thread_when_absent() {
        let (base_url, recorded) =
            fake_slack(json!({ "ok": true, "ts": "1730000004.0001" }), StatusCode::OK).await;

        let posted = client(&base_url).post_message("C9", None, "hello").await.expect("posted");

        assert_eq!(posted.message_ts.as_deref(), Some("1730000004.0001"));
        let recorded = recorded.lock().await;
        let (method, _, body) = &recorded.calls[0];
        assert_eq!(method, "chat.postMessage");
        assert!(body.get("thread_ts").is_none());
    }

    #[tokio::test]
    async fn delete_original_posts_to_response_url_without_token() {
        let (base_url, recorded) = fake_slack(json!({ "ok": true }), StatusCode::OK).await;

        client(&base_url)
            .delete_original(&format!("{base_url}/actions-T1-abc"))
            .await
            .expect("deleted");

        let recorded = recorded.lock().await;
        let (method, auth, body) = &recorded.calls[0];
        assert_eq!(method, "actions-T1-abc");
        assert_eq!(auth, &None);
        assert_eq!(body, &json!({ "delete_original": true }));
    }

    #[tokio::test]
    async fn delete_original_maps_http_failure() {
        let (base_url, _) = fake_slack(json!({}), StatusCode::NOT_FOUND).await;

        let error = client(&base_url)
            .delete_original(&format!("{base_url}/expired"))
            .await
            .expect_err("404");

        assert_eq!(error, DeliveryError::Status { method: "response_url", status: 404 });
    }

    #[tokio::test]
    async fn ok_false_maps_to_api_error() {
        let (base_url, _) =
            fake_slack(json!({ "ok": false, "error": "user_not_in_channel" }), StatusCode::OK).await;
        let message = render_suggestions("body", None);

        let error = client(&base_url)
            .post_ephemeral("C1", "U1", None, &message)
            .await
            .expect_err("slack refused");

        assert_eq!(
            error,
            DeliveryError::Api {
                method: "chat.postEphemeral",
                error: "user_not_in_channel".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn http_failure_maps_to_status_error() {
        let (base_url, _) = fake_slack(json!({}), StatusCode::SERVICE_UNAVAILABLE).await;

        let error = client(&base_url).post_message("C1", None, "x").await.expect_err("503");

        assert_eq!(error, DeliveryError::Status { method: "chat.postMessage", status: 503 });
    }
}
