//! URL Disk Cache - A persistent disk tier for network responses
//!
//! Stores cacheable responses on disk behind an in-memory tier, with
//! time-based admission, size-bounded LRU eviction and background
//! maintenance.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use cache::{CacheProvider, DiskCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use models::{CacheRequest, CachedResponse, StoragePolicy};
pub use tasks::{MaintenanceReport, MaintenanceScheduler, MaintenanceTrigger, SchedulerState};
