//! Request model
//!
//! Only the parts of a network request that identify a cache slot.

use serde::{Deserialize, Serialize};

/// A network request as seen by the disk cache.
///
/// # Fields
/// - `method`: HTTP method, compared case-insensitively
/// - `url`: Absolute request URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRequest {
    /// The request method
    pub method: String,
    /// The request URL
    pub url: String,
}

impl CacheRequest {
    /// Creates a new request with the given method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    /// Creates a GET request for the URL
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Returns the method normalized to upper case
    pub fn normalized_method(&self) -> String {
        self.method.trim().to_ascii_uppercase()
    }
}
