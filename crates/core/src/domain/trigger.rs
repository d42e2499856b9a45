use serde::{Deserialize, Serialize};

use crate::domain::notification::{NotificationId, NotificationRecord};
use crate::errors::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Button attached to a message; the reply is never threaded.
    MessageAction,
    /// Shortcut invoked against a message; the reply follows the message's thread.
    Shortcut,
    /// Dismiss button on a posted suggestion.
    ButtonClick,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageAction => "message_action",
            Self::Shortcut => "shortcut",
            Self::ButtonClick => "button_click",
        }
    }
}

/// Inbound trigger as parsed from the platform. Everything the platform may
/// omit is optional so that validation can see what is missing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub message_text: Option<String>,
    pub channel_id: Option<String>,
    pub user_id: Option<String>,
    pub message_ts: Option<String>,
    pub thread_ts: Option<String>,
    pub action_value: Option<String>,
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub message_text: String,
    pub channel_id: String,
    pub user_id: String,
    pub message_ts: Option<String>,
    pub thread_ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DismissRequest {
    pub notification_id: NotificationId,
    pub user_id: String,
    /// Where the platform accepts edits to the message carrying the button.
    pub response_url: Option<String>,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            message_text: None,
            channel_id: None,
            user_id: None,
            message_ts: None,
            thread_ts: None,
            action_value: None,
            response_url: None,
        }
    }

    /// Builds the work item for a suggestion trigger. Text, channel and user
    /// must all be present and non-blank.
    pub fn suggestion_request(&self) -> Result<SuggestionRequest, ValidationError> {
        let message_text = required(&self.message_text, "message_text")?;
        let channel_id = required(&self.channel_id, "channel_id")?;
        let user_id = required(&self.user_id, "user_id")?;

        Ok(SuggestionRequest {
            message_text,
            channel_id,
            user_id,
            message_ts: present(&self.message_ts),
            thread_ts: self.thread_scope(),
        })
    }

    pub fn dismiss_request(&self) -> Result<DismissRequest, ValidationError> {
        let notification_id = required(&self.action_value, "action_value")?;
        let user_id = required(&self.user_id, "user_id")?;

        Ok(DismissRequest {
            notification_id: NotificationId::from(notification_id),
            user_id,
            response_url: present(&self.response_url),
        })
    }

    fn thread_scope(&self) -> Option<String> {
        match self.kind {
            TriggerKind::MessageAction => None,
            TriggerKind::Shortcut | TriggerKind::ButtonClick => present(&self.thread_ts),
        }
    }
}

impl SuggestionRequest {
    pub fn notification_record(&self) -> NotificationRecord {
        NotificationRecord {
            channel_id: self.channel_id.clone(),
            user_id: self.user_id.clone(),
            thread_ts: self.thread_ts.clone(),
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    present(value).ok_or(ValidationError::MissingField(field))
}
