use thiserror::Error;

use crate::domain::NotificationId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("trigger payload is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation provider returned status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("generation provider response could not be decoded: {0}")]
    MalformedResponse(String),
    #[error("generation provider returned no text")]
    EmptyResponse,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("{method} request failed: {message}")]
    Transport { method: &'static str, message: String },
    #[error("{method} returned http status {status}")]
    Status { method: &'static str, status: u16 },
    #[error("{method} was rejected by slack: {error}")]
    Api { method: &'static str, error: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("notification `{0}` is already registered")]
    DuplicateIdentifier(NotificationId),
}

/// Every failure a suggestion flow can hit. None of these ever reach the
/// platform; they end up as a log line or the fixed apology text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl LifecycleError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Generation(_) => "generation",
            Self::Delivery(_) => "delivery",
            Self::Tracker(_) => "tracker",
        }
    }

    /// Only generation failures surface to the user, and then only as the
    /// configured apology text.
    pub fn shows_apology(&self) -> bool {
        matches!(self, Self::Generation(_))
    }
}
