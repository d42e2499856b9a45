pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notifications;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{
    DismissRequest, NotificationId, NotificationIdMinter, NotificationRecord, SuggestionRequest,
    TriggerEvent, TriggerKind,
};
pub use errors::{DeliveryError, GenerationError, LifecycleError, TrackerError, ValidationError};
pub use flows::{FlowAction, FlowEvent, FlowRun, FlowState, SuggestionFlow};
pub use notifications::{InMemoryNotificationStore, NotificationStore};
