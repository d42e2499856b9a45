use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use replyhint_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use replyhint_slack::{
    parse_request, EventContext, EventDispatcher, InboundRequest, SignatureVerifier,
};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    verifier: Arc<SignatureVerifier>,
    dispatcher: Arc<EventDispatcher>,
}

impl WebhookState {
    pub fn new(verifier: SignatureVerifier, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { verifier: Arc::new(verifier), dispatcher }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/slack/events", post(slack_events)).with_state(state)
}

/// Verifies, parses and dispatches one Slack request. Anything that passes the
/// signature check is acknowledged with 200, whatever happens afterwards.
pub async fn slack_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Err(error) = state.verifier.verify(
        header_value(&headers, TIMESTAMP_HEADER),
        header_value(&headers, SIGNATURE_HEADER),
        &body,
        Utc::now(),
    ) {
        warn!(
            event_name = "ingress.slack.rejected",
            correlation_id = %correlation_id,
            error = %error,
            "request signature rejected"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.malformed",
                correlation_id = %correlation_id,
                error = %error,
                "unreadable payload acknowledged"
            );
            return StatusCode::OK.into_response();
        }
    };

    match request {
        InboundRequest::UrlVerification { challenge } => {
            info!(
                event_name = "ingress.slack.url_verification",
                correlation_id = %correlation_id,
                "answering url verification challenge"
            );
            Json(json!({ "challenge": challenge })).into_response()
        }
        InboundRequest::Trigger(event) => {
            info!(
                event_name = "ingress.slack.trigger_received",
                correlation_id = %correlation_id,
                trigger_kind = event.kind.as_str(),
                channel_id = event.channel_id.as_deref().unwrap_or("unknown"),
                "slack trigger received"
            );
            let context = EventContext { correlation_id: correlation_id.clone() };
            let result = state.dispatcher.dispatch(&event, &context).await;
            debug!(
                event_name = "ingress.slack.ack_sent",
                correlation_id = %correlation_id,
                outcome = result.label(),
                "slack trigger acknowledged"
            );
            StatusCode::OK.into_response()
        }
        InboundRequest::Ignored { reason } => {
            debug!(
                event_name = "ingress.slack.ignored",
                correlation_id = %correlation_id,
                reason = %reason,
                "unsupported slack request acknowledged"
            );
            StatusCode::OK.into_response()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
