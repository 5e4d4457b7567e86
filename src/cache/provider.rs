//! Cache Provider Module
//!
//! The capability the networking layer's in-memory tier calls into.

use crate::cache::DiskCache;
use crate::models::{CacheRequest, CachedResponse};

// == Cache Provider ==
/// Persistent response cache as seen by the tier in front of it.
///
/// Implementations never surface errors: a degraded store shows up as
/// misses and dropped writes.
pub trait CacheProvider: Send + Sync {
    /// Offers a freshly received response for persistence.
    fn store(&self, request: &CacheRequest, response: CachedResponse);

    /// Looks up a stored response.
    fn fetch(&self, request: &CacheRequest) -> Option<CachedResponse>;

    /// Invalidates the stored response for a request.
    fn remove(&self, request: &CacheRequest);

    /// Invalidates everything.
    fn purge_all(&self);
}

impl CacheProvider for DiskCache {
    fn store(&self, request: &CacheRequest, response: CachedResponse) {
        DiskCache::store(self, request, response);
    }

    fn fetch(&self, request: &CacheRequest) -> Option<CachedResponse> {
        DiskCache::fetch(self, request)
    }

    fn remove(&self, request: &CacheRequest) {
        DiskCache::remove(self, request)
    }

    fn purge_all(&self) {
        DiskCache::purge_all(self)
    }
}
