//! Response model
//!
//! A network response reduced to what the disk tier needs: status, headers,
//! body, and the freshness decision made upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the upstream layer allows a response to be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    /// Cacheable in memory and on disk
    Allowed,
    /// Cacheable in memory only
    AllowedInMemoryOnly,
    /// Not cacheable at all
    NotAllowed,
}

impl StoragePolicy {
    /// Returns true if the policy permits persisting the response to disk.
    pub fn allows_disk(&self) -> bool {
        matches!(self, StoragePolicy::Allowed)
    }
}

/// A response together with its cache metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// The URL the response was fetched from
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Header fields in received order
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Absolute time after which the response is stale
    pub expires_at: DateTime<Utc>,
    /// Cacheability decided upstream
    pub storage_policy: StoragePolicy,
}

impl CachedResponse {
    /// Creates a disk-cacheable response with no headers.
    pub fn new(
        url: impl Into<String>,
        status: u16,
        body: impl Into<Vec<u8>>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
            expires_at,
            storage_policy: StoragePolicy::Allowed,
        }
    }

    /// Adds a header field.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the storage policy.
    pub fn with_storage_policy(mut self, policy: StoragePolicy) -> Self {
        self.storage_policy = policy;
        self
    }

    /// Looks up a header value, ignoring case of the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
