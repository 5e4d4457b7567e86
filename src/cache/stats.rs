//! Cache Statistics Module
//!
//! Tracks disk cache activity: hits, misses, writes, admissions and removals.

use serde::Serialize;

// == Cache Stats ==
/// Tracks disk cache metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Fetches served from disk
    pub hits: u64,
    /// Fetches that found nothing usable
    pub misses: u64,
    /// Entries written and indexed
    pub writes: u64,
    /// Background writes that failed with an I/O error
    pub write_failures: u64,
    /// Responses turned away by the admission policy
    pub rejected: u64,
    /// Entries removed by the capacity pass
    pub evictions: u64,
    /// Entries removed by the expiration pass
    pub expirations: u64,
    /// Stale index entries dropped after a failed read
    pub self_heals: u64,
    /// Current number of indexed entries
    pub total_entries: usize,
    /// Current indexed bytes on disk
    pub usage_bytes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no fetches have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_write_failure(&mut self) {
        self.write_failures += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub fn record_self_heal(&mut self) {
        self.self_heals += 1;
    }

    // == Record Sweep ==
    /// Adds the removals of one eviction sweep.
    pub fn record_sweep(&mut self, expired: usize, evicted: usize) {
        self.expirations += expired as u64;
        self.evictions += evicted as u64;
    }

    // == Update Usage ==
    /// Updates the entry count and byte usage gauges.
    pub fn set_usage(&mut self, total_entries: usize, usage_bytes: u64) {
        self.total_entries = total_entries;
        self.usage_bytes = usage_bytes;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.usage_bytes, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_sweep() {
        let mut stats = CacheStats::new();
        stats.record_sweep(2, 3);
        stats.record_sweep(1, 0);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.evictions, 3);
    }

    #[test]
    fn test_write_counters() {
        let mut stats = CacheStats::new();
        stats.record_write();
        stats.record_write_failure();
        stats.record_rejection();
        stats.record_self_heal();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.self_heals, 1);
    }

    #[test]
    fn test_set_usage() {
        let mut stats = CacheStats::new();
        stats.set_usage(42, 4096);
        assert_eq!(stats.total_entries, 42);
        assert_eq!(stats.usage_bytes, 4096);
    }
}
