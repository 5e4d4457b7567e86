//! Admission Policy Module
//!
//! Decides whether a response is worth writing to disk at all.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::CachedResponse;

// == Admission Policy ==
/// Admits disk-cacheable responses that stay fresh for at least
/// `min_cache_interval`.
///
/// Entries expiring sooner are left to the in-memory tier.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    min_cache_interval: Duration,
}

impl AdmissionPolicy {
    // == Constructor ==
    /// Creates a policy with the given minimum freshness window.
    pub fn new(min_cache_interval: Duration) -> Self {
        Self { min_cache_interval }
    }

    /// Returns the minimum freshness window.
    pub fn min_cache_interval(&self) -> Duration {
        self.min_cache_interval
    }

    // == Accepts ==
    /// Returns true if the response should be persisted.
    pub fn accepts(&self, response: &CachedResponse, now: DateTime<Utc>) -> bool {
        if !response.storage_policy.allows_disk() {
            return false;
        }
        // Negative remaining lifetime fails the conversion and is rejected
        match (response.expires_at - now).to_std() {
            Ok(remaining) => remaining >= self.min_cache_interval,
            Err(_) => false,
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
