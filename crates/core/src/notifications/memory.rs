use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::NotificationStore;
use crate::domain::{NotificationId, NotificationRecord};
use crate::errors::TrackerError;

#[derive(Debug)]
struct TrackedEntry {
    record: NotificationRecord,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct TrackerState {
    records: HashMap<NotificationId, TrackedEntry>,
    // Ordered by deadline. Entries whose id was dismissed (or re-registered
    // with a later deadline) are skipped when popped.
    expiry: BinaryHeap<Reverse<(Instant, NotificationId)>>,
}

/// Process-local tracker with a fixed lifetime per record.
#[derive(Debug)]
pub struct InMemoryNotificationStore {
    ttl: Duration,
    state: RwLock<TrackerState>,
}

impl InMemoryNotificationStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, state: RwLock::new(TrackerState::default()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait::async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn register(
        &self,
        id: NotificationId,
        record: NotificationRecord,
    ) -> Result<(), TrackerError> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        if state.records.get(&id).is_some_and(|entry| entry.expires_at > now) {
            return Err(TrackerError::DuplicateIdentifier(id));
        }

        let expires_at = now + self.ttl;
        state.expiry.push(Reverse((expires_at, id.clone())));
        state.records.insert(id, TrackedEntry { record, expires_at });
        Ok(())
    }

    async fn resolve(&self, id: &NotificationId) -> Option<NotificationRecord> {
        let now = Instant::now();
        let state = self.state.read().await;
        state
            .records
            .get(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.record.clone())
    }

    async fn dismiss(&self, id: &NotificationId) -> Option<NotificationRecord> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.records.remove(id).filter(|entry| entry.expires_at > now).map(|entry| entry.record)
    }

    async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let mut evicted = 0;

        while let Some(Reverse((deadline, _))) = state.expiry.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, id))) = state.expiry.pop() else {
                break;
            };
            let current = state.records.get(&id).map(|entry| entry.expires_at);
            if current == Some(deadline) {
                state.records.remove(&id);
                evicted += 1;
            }
        }

        evicted
    }

    async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }
}

/// Runs `evict_expired` every `interval` until `shutdown` fires.
pub fn spawn_eviction_sweeper(
    store: Arc<dyn NotificationStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(event_name = "tracker.sweeper.stopped", "notification sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let evicted = store.evict_expired().await;
                    if evicted > 0 {
                        let remaining = store.len().await;
                        info!(
                            event_name = "tracker.evicted",
                            evicted,
                            remaining,
                            "expired notifications evicted"
                        );
                    }
                }
            }
        }
    })
}
