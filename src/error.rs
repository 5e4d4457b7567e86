//! Error types for the disk cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the disk cache.
///
/// None of these reach callers of the cache facade: a failed fetch is a miss
/// and a failed write simply leaves the entry out of the index.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Disk read, write or delete failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes could not be decoded back into a response
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// No file or index entry for the key
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Index persistence or bookkeeping failure
    #[error("Index error: {0}")]
    Index(String),

    /// Internal error (runtime unavailable, worker lane gone)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Index(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the disk cache.
pub type Result<T> = std::result::Result<T, CacheError>;
