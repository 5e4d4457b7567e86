//! Cache Module
//!
//! Provides the persistent disk tier: key derivation, entry codec, disk
//! store, index, admission and eviction, and the facade composing them.

mod admission;
pub mod codec;
mod disk;
mod entry;
mod eviction;
mod index;
mod key;
mod provider;
mod stats;
mod store;


// Re-export public types
pub use admission::AdmissionPolicy;
pub use disk::{DiskStore, StoredFile};
pub use entry::EntryMetadata;
pub use eviction::{EvictionManager, SweepReport};
pub use index::{CacheIndex, INDEX_FILE_NAME};
pub use key::CacheKey;
pub use provider::CacheProvider;
pub use stats::CacheStats;
pub use store::DiskCache;

pub(crate) use store::CacheCore;
