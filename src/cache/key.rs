//! Cache Key Module
//!
//! Derives stable, filesystem-safe keys from requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::CacheRequest;

// == Cache Key ==
/// Hex-encoded SHA-256 of `"<METHOD> <url>"`.
///
/// The digest doubles as the entry's file stem, so no further escaping is
/// needed when mapping a key to a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    // == From Request ==
    /// Derives the key for a request.
    pub fn from_request(request: &CacheRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.normalized_method().as_bytes());
        hasher.update(b" ");
        hasher.update(request.url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    // == From File Stem ==
    /// Rebuilds a key from an entry file stem.
    ///
    /// Returns None for anything that is not a 64-character lowercase hex digest.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let valid = stem.len() == 64
            && stem
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(stem.to_string()))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
