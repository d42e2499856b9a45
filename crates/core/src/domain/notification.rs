use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key correlating a dismiss click with the notification it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Where a tracked notification lives and whom it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub channel_id: String,
    pub user_id: String,
    pub thread_ts: Option<String>,
}

/// Mints identifiers of the form `channel:source_ts:issued_micros:sequence`.
/// The sequence keeps two triggers on the same message within the same
/// microsecond apart.
#[derive(Debug, Default)]
pub struct NotificationIdMinter {
    sequence: AtomicU64,
}

impl NotificationIdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(
        &self,
        channel_id: &str,
        message_ts: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> NotificationId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        NotificationId(format!(
            "{channel_id}:{}:{}:{sequence}",
            message_ts.unwrap_or("none"),
            issued_at.timestamp_micros()
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{TimeZone, Utc};

    use super::NotificationIdMinter;

    #[test]
    fn repeated_triggers_on_same_message_get_distinct_ids() {
        let minter = NotificationIdMinter::new();
        let issued_at = Utc.timestamp_opt(1_730_000_000, 0).single().expect("valid timestamp");

        let ids: HashSet<_> = (0..50)
            .map(|_| minter.mint("C1", Some("1730000000.0001"), issued_at))
            .collect();

        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn id_embeds_channel_source_ts_and_issuance_time() {
        let minter = NotificationIdMinter::new();
        let issued_at = Utc.timestamp_opt(1_730_000_000, 0).single().expect("valid timestamp");

        let id = minter.mint("C1", Some("1730000000.0001"), issued_at);

        assert_eq!(id.as_str(), "C1:1730000000.0001:1730000000000000:0");
        assert_eq!(minter.mint("C2", None, issued_at).as_str(), "C2:none:1730000000000000:1");
    }
}
