//! Eviction Manager Module
//!
//! Enforces the expiration and capacity bounds over the index and disk store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheIndex, CacheKey, DiskStore};

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed by the expiration pass
    pub expired: usize,
    /// Entries removed by the capacity pass
    pub evicted: usize,
    /// Removals where the key had already left the index
    pub index_failures: usize,
    /// Removals where the file could not be deleted
    pub disk_failures: usize,
    /// Index usage after the sweep
    pub usage_after: u64,
}

// == Eviction Manager ==
/// Removes entries from index and disk together.
pub struct EvictionManager<'a> {
    index: &'a CacheIndex,
    disk: &'a DiskStore,
}

impl<'a> EvictionManager<'a> {
    // == Constructor ==
    pub fn new(index: &'a CacheIndex, disk: &'a DiskStore) -> Self {
        Self { index, disk }
    }

    // == Sweep ==
    /// Runs the expiration pass, then the capacity pass.
    ///
    /// The capacity pass removes least recently accessed entries until usage
    /// is at or below `capacity_bytes`.
    pub fn sweep(&self, capacity_bytes: u64, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        // Expiration pass
        for key in self.index.expired_keys(now) {
            if self.remove_entry(&key, &mut report) {
                report.expired += 1;
            }
        }

        // Capacity pass
        if self.index.usage() > capacity_bytes {
            for (key, _) in self.index.lru_order() {
                if self.index.usage() <= capacity_bytes {
                    break;
                }
                if self.remove_entry(&key, &mut report) {
                    report.evicted += 1;
                }
            }
        }

        report.usage_after = self.index.usage();
        debug!(
            "Eviction sweep: expired={}, evicted={}, usage={}/{}",
            report.expired, report.evicted, report.usage_after, capacity_bytes
        );
        report
    }

    /// Drops the key from the index, then deletes its file.
    ///
    /// Returns false if the key was no longer indexed.
    fn remove_entry(&self, key: &CacheKey, report: &mut SweepReport) -> bool {
        if self.index.remove(key).is_none() {
            warn!("Eviction of {} failed: key no longer indexed", key);
            report.index_failures += 1;
            return false;
        }
        if let Err(e) = self.disk.delete(key) {
            warn!("Failed to delete evicted entry {}: {}", key, e);
            report.disk_failures += 1;
        }
        true
    }
}
