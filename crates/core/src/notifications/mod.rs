use async_trait::async_trait;

use crate::domain::{NotificationId, NotificationRecord};
use crate::errors::TrackerError;

pub mod memory;

pub use memory::{spawn_eviction_sweeper, InMemoryNotificationStore};

/// Tracks posted notifications until they are dismissed or expire. Every
/// operation is atomic with respect to the others.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Refuses an identifier that is already tracked instead of overwriting it.
    async fn register(
        &self,
        id: NotificationId,
        record: NotificationRecord,
    ) -> Result<(), TrackerError>;

    /// `None` covers both "never issued" and "already dismissed or expired".
    async fn resolve(&self, id: &NotificationId) -> Option<NotificationRecord>;

    /// Removes and returns the record; `None` when nothing was tracked.
    async fn dismiss(&self, id: &NotificationId) -> Option<NotificationRecord>;

    /// Drops every record whose lifetime has elapsed, returning how many went.
    async fn evict_expired(&self) -> usize;

    async fn len(&self) -> usize;
}
