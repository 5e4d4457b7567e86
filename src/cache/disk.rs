//! Disk Store Module
//!
//! One file per cache key under the cache directory.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::CacheKey;
use crate::error::{CacheError, Result};

const ENTRY_EXTENSION: &str = "entry";
const TMP_EXTENSION: &str = "tmp";

/// An entry file found while scanning the cache directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Key recovered from the file name
    pub key: CacheKey,
    /// File length in bytes
    pub size: u64,
    /// Last modification time, when the filesystem reports one
    pub modified: Option<DateTime<Utc>>,
}

// == Disk Store ==
/// Maps cache keys to files on disk.
///
/// Writes land in a temporary file which is synced and then renamed over the
/// entry file, so readers only ever see complete entries.
#[derive(Debug, Clone)]
pub struct DiskStore {
    /// Cache directory root
    root: PathBuf,
}

impl DiskStore {
    // == Constructor ==
    /// Opens the store, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the entry file path for a key.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    fn tmp_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key.as_str(), TMP_EXTENSION))
    }

    // == Write ==
    /// Durably writes the bytes for a key and returns the stored size.
    pub fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<u64> {
        let tmp = self.tmp_path(key);
        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, self.entry_path(key))
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(bytes.len() as u64)
    }

    // == Read ==
    /// Reads the bytes stored for a key.
    pub fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        fs::read(self.entry_path(key)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::NotFound(key.to_string()),
            _ => CacheError::Io(e),
        })
    }

    // == Delete ==
    /// Deletes the file for a key. A missing file is not an error.
    pub fn delete(&self, key: &CacheKey) -> Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // == Size On Disk ==
    /// Returns the size in bytes of the file for a key.
    pub fn size_on_disk(&self, key: &CacheKey) -> Result<u64> {
        match fs::metadata(self.entry_path(key)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // == List ==
    /// Enumerates entry files.
    pub fn list(&self) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();

        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };

            if ext != ENTRY_EXTENSION {
                continue;
            }

            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::from_file_stem)
            else {
                warn!("Ignoring unrecognized cache file {}", path.display());
                continue;
            };

            let meta = match dir_entry.metadata() {
                Ok(meta) => meta,
                // Deleted between read_dir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            files.push(StoredFile {
                key,
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        Ok(files)
    }

    // == Remove Orphaned Temp Files ==
    /// Deletes temporary files left behind by interrupted writes.
    ///
    /// Only safe while no write is in flight, i.e. before the I/O lane starts.
    pub fn remove_orphaned_tmp(&self) -> Result<usize> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.root)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TMP_EXTENSION) {
                continue;
            }
            debug!("Removing interrupted write {}", path.display());
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    // == Clear ==
    /// Deletes every entry file and returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for file in self.list()? {
            self.delete(&file.key)?;
            removed += 1;
        }
        Ok(removed)
    }
}
