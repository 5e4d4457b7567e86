//! Cache Store Module
//!
//! The disk cache facade: admission, asynchronous writes through the I/O
//! lane, synchronous reads with self-healing, invalidation and maintenance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::cache::{
    codec, AdmissionPolicy, CacheIndex, CacheKey, CacheStats, DiskStore, EntryMetadata,
    EvictionManager, INDEX_FILE_NAME,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{CacheRequest, CachedResponse};
use crate::tasks::{
    IoLane, Job, MaintenanceReport, MaintenanceScheduler, MaintenanceTrigger, PeriodicMaintenance,
};

/// What startup reconciliation changed in the loaded index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ReconcileReport {
    /// Index entries whose file was missing
    pub dropped: usize,
    /// Index entries whose size disagreed with the file
    pub resized: usize,
    /// Unindexed files recovered into the index
    pub adopted: usize,
    /// Unindexed files that failed to decode and were deleted
    pub discarded: usize,
}

// == Cache Core ==
/// State shared between the facade and the I/O lane.
#[derive(Debug)]
pub(crate) struct CacheCore {
    pub(crate) disk: DiskStore,
    pub(crate) index: CacheIndex,
    admission: AdmissionPolicy,
    capacity_bytes: u64,
    stats: Mutex<CacheStats>,
}

impl CacheCore {
    /// Opens the store, loads and reconciles the index, and runs an initial sweep.
    pub(crate) fn open(config: &Config) -> Result<Self> {
        let disk = DiskStore::open(&config.cache_dir)?;
        let index = CacheIndex::load(config.cache_dir.join(INDEX_FILE_NAME));

        let core = Self {
            disk,
            index,
            admission: AdmissionPolicy::new(config.min_cache_duration()),
            capacity_bytes: config.capacity_bytes,
            stats: Mutex::new(CacheStats::new()),
        };

        let reconciled = core.reconcile()?;
        if reconciled != ReconcileReport::default() {
            info!(
                "Reconciled cache index: dropped={}, resized={}, adopted={}, discarded={}",
                reconciled.dropped, reconciled.resized, reconciled.adopted, reconciled.discarded
            );
        }

        let sweep = EvictionManager::new(&core.index, &core.disk)
            .sweep(core.capacity_bytes, Utc::now());
        core.stats().record_sweep(sweep.expired, sweep.evicted);

        Ok(core)
    }

    fn stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Reconcile ==
    /// Brings the index in line with the files actually on disk.
    fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let interrupted = self.disk.remove_orphaned_tmp()?;
        if interrupted > 0 {
            info!("Removed {} interrupted writes", interrupted);
        }

        let files: HashMap<CacheKey, _> = self
            .disk
            .list()?
            .into_iter()
            .map(|file| (file.key.clone(), file))
            .collect();
        let indexed = self.index.snapshot();

        for (key, meta) in &indexed {
            match files.get(key) {
                None => {
                    self.index.remove(key);
                    report.dropped += 1;
                }
                Some(file) if file.size != meta.size => {
                    let mut fixed = meta.clone();
                    fixed.size = file.size;
                    self.index.put(key.clone(), fixed);
                    report.resized += 1;
                }
                Some(_) => {}
            }
        }

        let now = Utc::now();
        for (key, file) in files {
            if indexed.contains_key(&key) {
                continue;
            }
            match self.disk.read(&key).and_then(|bytes| codec::decode(&bytes)) {
                Ok(response) => {
                    let last_access = file.modified.unwrap_or(now);
                    self.index.put(
                        key,
                        EntryMetadata::new(file.size, response.expires_at, last_access),
                    );
                    report.adopted += 1;
                }
                Err(e) => {
                    warn!("Discarding unreadable cache file {}: {}", key, e);
                    if let Err(e) = self.disk.delete(&key) {
                        warn!("Failed to delete unreadable cache file {}: {}", key, e);
                    }
                    report.discarded += 1;
                }
            }
        }

        Ok(report)
    }

    // == Write Entry ==
    /// Encodes and writes a response, indexing it only once the file is durable.
    pub(crate) fn write_entry(&self, key: CacheKey, response: &CachedResponse) {
        let bytes = match codec::encode(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode cache entry for {}: {}", response.url, e);
                self.stats().record_write_failure();
                return;
            }
        };

        match self.disk.write(&key, &bytes) {
            Ok(size) => {
                self.index
                    .put(key, EntryMetadata::new(size, response.expires_at, Utc::now()));
                self.stats().record_write();
                debug!("Stored {} ({} bytes)", response.url, size);
            }
            Err(e) => {
                warn!("Failed to write cache entry for {}: {}", response.url, e);
                self.stats().record_write_failure();
            }
        }
    }

    // == Delete Entry ==
    /// Removes a key from index and disk.
    pub(crate) fn delete_entry(&self, key: &CacheKey) {
        self.index.remove(key);
        if let Err(e) = self.disk.delete(key) {
            warn!("Failed to delete cache entry {}: {}", key, e);
        }
    }

    // == Evict Stale ==
    /// Deletes the file of an entry a reader found unusable.
    ///
    /// Skipped when a newer write has replaced the entry in the meantime.
    pub(crate) fn evict_stale(&self, key: &CacheKey, seen: &EntryMetadata) {
        let replaced = self
            .index
            .get(key)
            .is_some_and(|m| m.generation != seen.generation);
        if replaced {
            return;
        }
        self.index.remove_if_unchanged(key, seen);
        if let Err(e) = self.disk.delete(key) {
            warn!("Failed to delete stale cache entry {}: {}", key, e);
        }
    }

    // == Purge ==
    /// Clears the index and deletes every entry file.
    pub(crate) fn purge(&self) {
        let dropped = self.index.clear();
        match self.disk.clear() {
            Ok(removed) => debug!("Purged {} indexed entries, {} files", dropped, removed),
            Err(e) => warn!("Failed to purge cache directory: {}", e),
        }
    }

    // == Checkpoint ==
    pub(crate) fn checkpoint(&self) -> Result<bool> {
        self.index.checkpoint()
    }

    // == Maintain ==
    /// One maintenance pass: checkpoint if dirty, then sweep.
    ///
    /// A shutdown pass checkpoints again afterwards so the persisted index
    /// reflects the sweep.
    pub(crate) fn maintain(&self, trigger: MaintenanceTrigger) -> MaintenanceReport {
        let mut checkpointed = self.checkpoint_logged();

        let sweep = EvictionManager::new(&self.index, &self.disk)
            .sweep(self.capacity_bytes, Utc::now());
        self.stats().record_sweep(sweep.expired, sweep.evicted);

        if trigger == MaintenanceTrigger::Shutdown {
            checkpointed |= self.checkpoint_logged();
        }

        MaintenanceReport {
            trigger,
            checkpointed,
            expired: sweep.expired,
            evicted: sweep.evicted,
            index_failures: sweep.index_failures,
            usage_after: sweep.usage_after,
        }
    }

    fn checkpoint_logged(&self) -> bool {
        match self.index.checkpoint() {
            Ok(written) => written,
            Err(e) => {
                warn!(
                    "Cache index checkpoint to {} failed: {}",
                    self.index.path().display(),
                    e
                );
                false
            }
        }
    }
}

// == Disk Cache ==
/// Persistent response cache.
///
/// Cheap to clone; all clones share one index, one disk store, one I/O
/// lane and one maintenance scheduler. Writes, deletes and maintenance run
/// on the lane in submission order. `fetch` reads synchronously on the
/// caller's thread.
///
/// Periodic maintenance starts with `open` and stops on `shutdown` or when
/// the last clone is dropped.
#[derive(Debug, Clone)]
pub struct DiskCache {
    core: Arc<CacheCore>,
    lane: IoLane,
    maintenance: Arc<PeriodicMaintenance>,
}

impl DiskCache {
    // == Constructor ==
    /// Opens the cache described by `config`.
    ///
    /// Must be called from within a Tokio runtime, which hosts the I/O lane
    /// and the periodic maintenance task.
    pub fn open(config: &Config) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| CacheError::Internal(format!("no Tokio runtime: {}", e)))?;
        let core = Arc::new(CacheCore::open(config)?);
        let lane = IoLane::spawn(Arc::clone(&core), &handle);
        let maintenance = PeriodicMaintenance::start(
            MaintenanceScheduler::new(lane.clone()),
            config.maintenance_period(),
            &handle,
        );

        info!(
            "Disk cache opened at {} ({} entries, {}/{} bytes, admission threshold {}s)",
            config.cache_dir.display(),
            core.index.len(),
            core.index.usage(),
            core.capacity_bytes,
            core.admission.min_cache_interval().as_secs()
        );
        Ok(Self {
            core,
            lane,
            maintenance: Arc::new(maintenance),
        })
    }

    // == Store ==
    /// Hands a response off for persistence.
    ///
    /// Returns immediately; the write happens on the I/O lane. Returns false
    /// if the admission policy rejected the response or the lane is gone.
    pub fn store(&self, request: &CacheRequest, response: CachedResponse) -> bool {
        if !self.core.admission.accepts(&response, Utc::now()) {
            debug!("Not admitting {} to disk cache", response.url);
            self.core.stats().record_rejection();
            return false;
        }

        let key = CacheKey::from_request(request);
        self.lane.submit(Job::Write {
            key,
            response: Box::new(response),
        })
    }

    // == Fetch ==
    /// Returns the cached response for a request, or None on a miss.
    ///
    /// May block on disk I/O. Unreadable entries count as misses; missing,
    /// corrupt or expired ones are dropped from the index.
    pub fn fetch(&self, request: &CacheRequest) -> Option<CachedResponse> {
        let key = CacheKey::from_request(request);
        let now = Utc::now();

        let Some(meta) = self.core.index.get(&key) else {
            self.core.stats().record_miss();
            return None;
        };

        if meta.is_expired(now) {
            self.core.index.remove_if_unchanged(&key, &meta);
            self.lane.submit(Job::EvictStale { key, seen: meta });
            self.core.stats().record_miss();
            return None;
        }

        match self.core.disk.read(&key).and_then(|bytes| codec::decode(&bytes)) {
            Ok(response) => {
                self.core.index.touch(&key, now);
                self.core.stats().record_hit();
                Some(response)
            }
            Err(CacheError::NotFound(_)) => {
                debug!("Cache file for {} vanished, dropping index entry", request.url);
                self.core.index.remove_if_unchanged(&key, &meta);
                let mut stats = self.core.stats();
                stats.record_self_heal();
                stats.record_miss();
                None
            }
            Err(CacheError::CorruptEntry(reason)) => {
                warn!("Corrupt cache entry for {}: {}", request.url, reason);
                self.core.index.remove_if_unchanged(&key, &meta);
                self.lane.submit(Job::EvictStale { key, seen: meta });
                let mut stats = self.core.stats();
                stats.record_self_heal();
                stats.record_miss();
                None
            }
            Err(e) => {
                warn!("Failed to read cache entry for {}: {}", request.url, e);
                self.core.stats().record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Invalidates the entry for a request.
    ///
    /// Index and file are dropped immediately; a matching delete is queued
    /// behind any write for the same key still in flight.
    pub fn remove(&self, request: &CacheRequest) {
        let key = CacheKey::from_request(request);
        self.core.delete_entry(&key);
        self.lane.submit(Job::Delete { key });
    }

    // == Purge All ==
    /// Drops every entry from index and disk.
    pub fn purge_all(&self) {
        self.core.purge();
        self.lane.submit(Job::Purge);
        info!("Disk cache purged");
    }

    // == Flush ==
    /// Waits until every job submitted so far has run.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.lane.submit(Job::Flush { reply }) {
            let _ = done.await;
        }
    }

    // == Checkpoint ==
    /// Persists the index now if it is dirty. Returns whether it was written.
    pub async fn checkpoint(&self) -> Result<bool> {
        let (reply, done) = oneshot::channel();
        if !self.lane.submit(Job::Checkpoint { reply }) {
            return Err(CacheError::Internal("I/O lane closed".to_string()));
        }
        done.await
            .map_err(|_| CacheError::Internal("I/O lane dropped checkpoint".to_string()))?
    }

    // == Maintenance ==
    /// Returns the scheduler shared by the periodic task and lifecycle events.
    pub fn scheduler(&self) -> &MaintenanceScheduler {
        self.maintenance.scheduler()
    }

    /// Starts a maintenance pass in the background, e.g. on low storage or
    /// when the host application is backgrounded.
    ///
    /// Returns false if a pass is already running.
    pub fn trigger_maintenance(&self, trigger: MaintenanceTrigger) -> bool {
        self.scheduler().trigger(trigger)
    }

    /// Runs one maintenance pass and waits for its report.
    ///
    /// Returns None if a pass was already running.
    pub async fn run_maintenance(&self, trigger: MaintenanceTrigger) -> Option<MaintenanceReport> {
        self.scheduler().run(trigger).await
    }

    // == Shutdown ==
    /// Stops periodic maintenance and runs the final pass.
    ///
    /// Waits for a pass already in flight first. The cache stays usable
    /// afterwards, without periodic maintenance.
    pub async fn shutdown(&self) -> Option<MaintenanceReport> {
        self.maintenance.stop();
        self.scheduler().shutdown().await
    }

    // == Accessors ==
    /// Returns the indexed bytes on disk.
    pub fn current_disk_usage(&self) -> u64 {
        self.core.index.usage()
    }

    /// Returns the configured capacity in bytes.
    pub fn disk_capacity(&self) -> u64 {
        self.core.capacity_bytes
    }

    /// Returns the number of indexed entries.
    pub fn entry_count(&self) -> usize {
        self.core.index.len()
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        self.core.disk.root()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.core.stats().clone();
        stats.set_usage(self.core.index.len(), self.core.index.usage());
        stats
    }

    #[cfg(test)]
    pub(crate) fn index(&self) -> &CacheIndex {
        &self.core.index
    }

    #[cfg(test)]
    pub(crate) fn disk(&self) -> &DiskStore {
        &self.core.disk
    }

    #[cfg(test)]
    pub(crate) fn maintenance(&self) -> &PeriodicMaintenance {
        &self.maintenance
    }
}
