//! Cache Index Module
//!
//! In-memory map from cache key to entry metadata, with an incrementally
//! maintained usage total and a dirty flag driving checkpoints.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, EntryMetadata};
use crate::error::{CacheError, Result};

/// File name of the persisted index inside the cache directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const INDEX_VERSION: u32 = 1;

/// On-disk form of the index.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    entries: HashMap<CacheKey, EntryMetadata>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<CacheKey, EntryMetadata>,
    /// Sum of `size` over `entries`
    usage: u64,
    dirty: bool,
    /// Last generation handed out by `insert`
    generation: u64,
}

impl IndexState {
    fn insert(&mut self, key: CacheKey, mut meta: EntryMetadata) -> Option<EntryMetadata> {
        self.generation += 1;
        meta.generation = self.generation;
        self.usage += meta.size;
        let previous = self.entries.insert(key, meta);
        if let Some(old) = &previous {
            self.usage -= old.size;
        }
        self.dirty = true;
        previous
    }

    fn remove(&mut self, key: &CacheKey) -> Option<EntryMetadata> {
        let removed = self.entries.remove(key);
        if let Some(old) = &removed {
            self.usage -= old.size;
            self.dirty = true;
        }
        removed
    }
}

// == Cache Index ==
/// Thread-safe index of stored entries.
///
/// A single mutex guards the map, the usage counter and the dirty flag, so
/// foreground reads and background mutations always see them consistent.
#[derive(Debug)]
pub struct CacheIndex {
    state: Mutex<IndexState>,
    /// Location of the persisted index
    path: PathBuf,
}

impl CacheIndex {
    // == Constructor ==
    /// Creates an empty index persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(IndexState::default()),
            path: path.into(),
        }
    }

    // == Load ==
    /// Loads the index persisted at `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty index; the
    /// caller reconciles it against the disk store afterwards.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let index = Self::new(path);

        match Self::read_persisted(&index.path) {
            Ok(Some(persisted)) => {
                let mut state = index.lock();
                state.usage = persisted.entries.values().map(|m| m.size).sum();
                state.generation = persisted
                    .entries
                    .values()
                    .map(|m| m.generation)
                    .max()
                    .unwrap_or(0);
                state.entries = persisted.entries;
                info!(
                    "Loaded cache index with {} entries ({} bytes)",
                    state.entries.len(),
                    state.usage
                );
            }
            Ok(None) => {
                debug!("No persisted cache index at {}", index.path.display());
            }
            Err(e) => {
                warn!("Discarding unreadable cache index: {}", e);
                index.lock().dirty = true;
            }
        }

        index
    }

    fn read_persisted(path: &Path) -> Result<Option<PersistedIndex>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        if persisted.version != INDEX_VERSION {
            return Err(CacheError::Index(format!(
                "unsupported index version {}",
                persisted.version
            )));
        }
        Ok(Some(persisted))
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        // A panic while holding the lock cannot leave the map and counter
        // out of step: every mutation updates both before returning.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the persisted index location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Get ==
    /// Returns the metadata for a key.
    pub fn get(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.lock().entries.get(key).cloned()
    }

    // == Put ==
    /// Inserts or replaces the metadata for a key, returning the previous value.
    ///
    /// The stored copy gets a fresh generation, so replacing an entry with
    /// byte-identical content is still told apart from the original.
    pub fn put(&self, key: CacheKey, meta: EntryMetadata) -> Option<EntryMetadata> {
        self.lock().insert(key, meta)
    }

    // == Remove ==
    /// Removes a key, returning its metadata if it was present.
    pub fn remove(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.lock().remove(key)
    }

    // == Remove If Unchanged ==
    /// Removes a key only if it is still the generation `seen` describes.
    ///
    /// Used when a reader finds an entry's bytes missing or corrupt: a newer
    /// write that landed meanwhile must survive.
    pub fn remove_if_unchanged(&self, key: &CacheKey, seen: &EntryMetadata) -> bool {
        let mut state = self.lock();
        let unchanged = state
            .entries
            .get(key)
            .is_some_and(|m| m.generation == seen.generation);
        if unchanged {
            state.remove(key);
        }
        unchanged
    }

    // == Touch ==
    /// Updates the last-access time of a key. Returns false if absent.
    pub fn touch(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        match state.entries.get_mut(key) {
            Some(meta) => {
                meta.last_access = now;
                state.dirty = true;
                true
            }
            None => false,
        }
    }

    // == Snapshot ==
    /// Returns a copy of the full mapping.
    pub fn snapshot(&self) -> HashMap<CacheKey, EntryMetadata> {
        self.lock().entries.clone()
    }

    // == Clear ==
    /// Removes every entry and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let count = state.entries.len();
        state.entries.clear();
        state.usage = 0;
        state.dirty = true;
        count
    }

    /// Returns the keys of entries expired at `now`.
    pub fn expired_keys(&self, now: DateTime<Utc>) -> Vec<CacheKey> {
        self.lock()
            .entries
            .iter()
            .filter(|(_, meta)| meta.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns all entries ordered from least to most recently accessed.
    ///
    /// Equal access times fall back to key order so eviction is deterministic.
    pub fn lru_order(&self) -> Vec<(CacheKey, EntryMetadata)> {
        let mut entries: Vec<_> = self
            .lock()
            .entries
            .iter()
            .map(|(k, m)| (k.clone(), m.clone()))
            .collect();
        entries.sort_by(|(ka, a), (kb, b)| a.last_access.cmp(&b.last_access).then(ka.cmp(kb)));
        entries
    }

    /// Returns the total stored size of all indexed entries.
    pub fn usage(&self) -> u64 {
        self.lock().usage
    }

    /// Returns the number of indexed entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns true if the index changed since the last checkpoint.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Flags the index for the next checkpoint.
    pub fn mark_dirty(&self) {
        self.lock().dirty = true;
    }

    // == Checkpoint ==
    /// Persists the index if dirty. Returns whether a write happened.
    ///
    /// The dirty flag is cleared before writing and restored on failure, so
    /// mutations racing the write are picked up by the next checkpoint.
    pub fn checkpoint(&self) -> Result<bool> {
        let persisted = {
            let mut state = self.lock();
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            PersistedIndex {
                version: INDEX_VERSION,
                entries: state.entries.clone(),
            }
        };

        let result = self.write_persisted(&persisted);
        if result.is_err() {
            self.mark_dirty();
        }
        result.map(|()| true)
    }

    fn write_persisted(&self, persisted: &PersistedIndex) -> Result<()> {
        let bytes = serde_json::to_vec(persisted)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(e) = fs::write(&tmp, &bytes).and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(
            "Checkpointed cache index ({} entries) to {}",
            persisted.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
