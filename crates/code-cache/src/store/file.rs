//! # File Store
//!
//! This module implements a directory-backed persistent record store. Each
//! record lives in `<dir>/<scope hash>.bin` next to a small JSON sidecar
//! `<scope hash>.meta` that allows tag checks without reading the record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::key::CacheLookupKey;
use crate::record::CacheRecord;
use crate::store::CacheStore;

/// Sidecar metadata for a stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Schema tag of the stored record
    pub tag: u32,
    /// Serialized record size in bytes
    pub size: u64,
    /// When the record was stored, seconds since the Unix epoch
    pub cached_at: u64,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at `cache_dir`, creating the directory if needed
    pub fn new(cache_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| CacheError::io(&cache_dir, e))?;
        debug!(dir = ?cache_dir, "File store opened");
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn data_path(&self, key: &CacheLookupKey) -> PathBuf {
        self.cache_dir.join(format!("{}.bin", key.to_filename()))
    }

    fn metadata_path(&self, key: &CacheLookupKey) -> PathBuf {
        self.cache_dir.join(format!("{}.meta", key.to_filename()))
    }

    fn read_metadata(path: &Path) -> CacheResult<Option<EntryMetadata>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Remove both files of an entry, ignoring files that are already gone
    fn remove_entry(&self, key: &CacheLookupKey) -> CacheResult<()> {
        for path in [self.data_path(key), self.metadata_path(key)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to remove cache file");
                    return Err(CacheError::io(path, e));
                }
            }
        }
        Ok(())
    }

    /// Write `contents` to a temporary file and rename it into place
    fn write_atomic(path: &Path, contents: &[u8]) -> CacheResult<()> {
        let temp_path = path.with_extension("tmp");
        if let Err(e) = fs::write(&temp_path, contents) {
            warn!(path = ?temp_path, error = %e, "Failed to write cache file");
            return Err(CacheError::io(temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            warn!(from = ?temp_path, to = ?path, error = %e, "Failed to rename temporary cache file");
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::io(path, e));
        }
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn lookup(&self, key: &CacheLookupKey) -> CacheResult<Option<CacheRecord>> {
        let meta_path = self.metadata_path(key);
        let metadata = match Self::read_metadata(&meta_path) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(path = ?meta_path, error = %e, "Unreadable cache metadata, removing entry");
                self.remove_entry(key)?;
                return Ok(None);
            }
        };

        if metadata.tag != key.tag() {
            debug!(
                stored_tag = metadata.tag,
                wanted_tag = key.tag(),
                "File store record has a different tag, treating as miss"
            );
            return Ok(None);
        }

        let data_path = self.data_path(key);
        let data = match fs::read(&data_path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to read cache data file, removing entry");
                self.remove_entry(key)?;
                return Ok(None);
            }
        };

        match CacheRecord::from_serialized(Bytes::from(data)) {
            Ok(record) if record.tag() == key.tag() => Ok(Some(record)),
            Ok(record) => {
                warn!(
                    stored_tag = record.tag(),
                    meta_tag = metadata.tag,
                    "Cache data disagrees with its metadata, removing entry"
                );
                self.remove_entry(key)?;
                Ok(None)
            }
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Malformed cache data file, removing entry");
                self.remove_entry(key)?;
                Ok(None)
            }
        }
    }

    fn evict(&self, key: &CacheLookupKey) -> CacheResult<()> {
        self.remove_entry(key)?;
        debug!(key = %key.to_filename(), "Evicted record from file store");
        Ok(())
    }

    fn store(&self, key: &CacheLookupKey, record: CacheRecord) -> CacheResult<()> {
        let metadata = EntryMetadata {
            tag: record.tag(),
            size: record.as_bytes().len() as u64,
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        let metadata_json = serde_json::to_vec(&metadata)?;

        // Data first, so a visible sidecar always has its data file
        Self::write_atomic(&self.data_path(key), record.as_bytes())?;
        if let Err(e) = Self::write_atomic(&self.metadata_path(key), &metadata_json) {
            let _ = fs::remove_file(self.data_path(key));
            return Err(e);
        }

        debug!(key = %key.to_filename(), size = metadata.size, "Stored record to file");
        Ok(())
    }
}
