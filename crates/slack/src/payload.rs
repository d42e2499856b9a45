use replyhint_core::domain::{TriggerEvent, TriggerKind};
use serde::Deserialize;
use thiserror::Error;

use crate::blocks::{DISMISS_ACTION_ID, GENERATE_ACTION_ID};

/// What an inbound `/slack/events` body turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundRequest {
    UrlVerification { challenge: String },
    Trigger(TriggerEvent),
    Ignored { reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("request body is not valid utf-8")]
    NotUtf8,
    #[error("form body has no `payload` field")]
    MissingPayload,
    #[error("payload is not valid json: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    callback_id: Option<String>,
    #[serde(default)]
    actions: Vec<ActionPayload>,
    user: Option<IdRef>,
    channel: Option<IdRef>,
    message: Option<MessagePayload>,
    container: Option<ContainerPayload>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    text: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionPayload {
    action_id: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerPayload {
    channel_id: Option<String>,
    message_ts: Option<String>,
    thread_ts: Option<String>,
}

/// Interactions arrive form-encoded as `payload=<json>`; Events API callbacks
/// (only `url_verification` matters here) arrive as a raw JSON body.
pub fn parse_request(body: &[u8]) -> Result<InboundRequest, PayloadError> {
    let text = std::str::from_utf8(body).map_err(|_| PayloadError::NotUtf8)?;

    if text.trim_start().starts_with('{') {
        let envelope: EventEnvelope = serde_json::from_str(text)
            .map_err(|error| PayloadError::InvalidJson(error.to_string()))?;
        return Ok(match (envelope.kind.as_str(), envelope.challenge) {
            ("url_verification", Some(challenge)) => InboundRequest::UrlVerification { challenge },
            (kind, _) => InboundRequest::Ignored { reason: format!("event callback `{kind}`") },
        });
    }

    let payload = url::form_urlencoded::parse(text.as_bytes())
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or(PayloadError::MissingPayload)?;
    parse_interaction(&payload)
}

pub fn parse_interaction(payload: &str) -> Result<InboundRequest, PayloadError> {
    let interaction: InteractionPayload = serde_json::from_str(payload)
        .map_err(|error| PayloadError::InvalidJson(error.to_string()))?;

    match interaction.kind.as_str() {
        "block_actions" => Ok(block_action_trigger(interaction)),
        "message_action" | "shortcut" => {
            if interaction.callback_id.as_deref() == Some(GENERATE_ACTION_ID) {
                Ok(InboundRequest::Trigger(trigger(interaction, TriggerKind::Shortcut, None)))
            } else {
                Ok(InboundRequest::Ignored {
                    reason: format!(
                        "callback `{}`",
                        interaction.callback_id.as_deref().unwrap_or("none")
                    ),
                })
            }
        }
        other => Ok(InboundRequest::Ignored { reason: format!("interaction type `{other}`") }),
    }
}

fn block_action_trigger(interaction: InteractionPayload) -> InboundRequest {
    let matched = interaction.actions.iter().find_map(|action| match action.action_id.as_str() {
        GENERATE_ACTION_ID => Some((TriggerKind::MessageAction, None)),
        DISMISS_ACTION_ID => Some((TriggerKind::ButtonClick, action.value.clone())),
        _ => None,
    });

    match matched {
        Some((kind, action_value)) => InboundRequest::Trigger(trigger(interaction, kind, action_value)),
        None => InboundRequest::Ignored {
            reason: format!(
                "block actions [{}]",
                interaction
                    .actions
                    .iter()
                    .map(|action| action.action_id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
    }
}

fn trigger(
    interaction: InteractionPayload,
    kind: TriggerKind,
    action_value: Option<String>,
) -> TriggerEvent {
    let container = interaction.container;
    let message = interaction.message;

    let channel_id = interaction
        .channel
        .and_then(|channel| channel.id)
        .or_else(|| container.as_ref().and_then(|container| container.channel_id.clone()));
    let message_ts = message
        .as_ref()
        .and_then(|message| message.ts.clone())
        .or_else(|| container.as_ref().and_then(|container| container.message_ts.clone()));
    let thread_ts = message
        .as_ref()
        .and_then(|message| message.thread_ts.clone())
        .or_else(|| container.as_ref().and_then(|container| container.thread_ts.clone()));

    TriggerEvent {
        message_text: message.and_then(|message| message.text),
        channel_id,
        user_id: interaction.user.and_then(|user| user.id),
        message_ts,
        thread_ts,
        action_value,
        response_url: interaction.response_url,
        ..TriggerEvent::new(kind)
    }
}
