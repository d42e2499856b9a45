pub mod notification;
pub mod trigger;

pub use notification::{NotificationId, NotificationIdMinter, NotificationRecord};
pub use trigger::{DismissRequest, SuggestionRequest, TriggerEvent, TriggerKind};
