//! Request and Response models handed to the disk cache
//!
//! These are the value types the surrounding networking layer passes in:
//! the request identifying a cache slot and the response to persist.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::CacheRequest;
pub use responses::{CachedResponse, StoragePolicy};
