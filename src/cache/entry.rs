//! Cache Entry Module
//!
//! Defines the per-entry metadata held in the index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Entry Metadata ==
/// Index record for one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Bytes occupied on disk
    pub size: u64,
    /// Absolute time after which the entry is stale
    pub expires_at: DateTime<Utc>,
    /// Last time the entry was written or read
    pub last_access: DateTime<Utc>,
    /// Sequence number assigned by the index on every put
    #[serde(default)]
    pub generation: u64,
}

impl EntryMetadata {
    // == Constructor ==
    /// Creates metadata for an entry written at `now`.
    pub fn new(size: u64, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            size,
            expires_at,
            last_access: now,
            generation: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now` reaches its expiration time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_sets_last_access() {
        let now = Utc::now();
        let meta = EntryMetadata::new(10, now + Duration::seconds(60), now);
        assert_eq!(meta.last_access, now);
        assert_eq!(meta.size, 10);
        assert!(!meta.is_expired(now));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let meta = EntryMetadata::new(1, now, now);

        // Entry should be expired when now >= expires_at
        assert!(meta.is_expired(now), "Entry should be expired at boundary");
        assert!(!meta.is_expired(now - Duration::milliseconds(1)));
    }

    #[test]
    fn test_generation_defaults_when_missing() {
        let json = r#"{"size":3,"expires_at":"2030-01-01T00:00:00Z",
            "last_access":"2029-01-01T00:00:00Z"}"#;
        let meta: EntryMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.generation, 0);
    }

    #[test]
    fn test_serde_roundtrip() {
        let now = Utc::now();
        let meta = EntryMetadata::new(42, now + Duration::hours(1), now);
        let json = serde_json::to_string(&meta).unwrap();
        let back: EntryMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
