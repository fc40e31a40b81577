//! # Tiered Store
//!
//! Coordinates a memory store in front of a file store.

use std::sync::Arc;

use tracing::warn;

use crate::error::CacheResult;
use crate::key::CacheLookupKey;
use crate::record::CacheRecord;
use crate::store::{CacheStore, FileStore, MemoryStore};

/// Memory store backed by a file store.
///
/// Lookups check memory first and promote file hits into memory. Writes and
/// evictions go to both tiers; the file tier's result is the one reported.
#[derive(Clone)]
pub struct TieredStore {
    memory: Arc<MemoryStore>,
    file: Arc<FileStore>,
}

impl TieredStore {
    pub fn new(memory: MemoryStore, file: FileStore) -> Self {
        Self {
            memory: Arc::new(memory),
            file: Arc::new(file),
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn file(&self) -> &FileStore {
        &self.file
    }
}

impl CacheStore for TieredStore {
    fn lookup(&self, key: &CacheLookupKey) -> CacheResult<Option<CacheRecord>> {
        if let Some(record) = self.memory.lookup(key)? {
            return Ok(Some(record));
        }

        let Some(record) = self.file.lookup(key)? else {
            return Ok(None);
        };

        if let Err(e) = self.memory.store(key, record.clone()) {
            warn!(error = %e, "Failed to promote record into memory store");
        }
        Ok(Some(record))
    }

    fn evict(&self, key: &CacheLookupKey) -> CacheResult<()> {
        let mem_result = self.memory.evict(key);
        let file_result = self.file.evict(key);
        file_result.and(mem_result)
    }

    fn store(&self, key: &CacheLookupKey, record: CacheRecord) -> CacheResult<()> {
        if let Err(e) = self.memory.store(key, record.clone()) {
            warn!(error = %e, "Failed to store record in memory store");
        }
        self.file.store(key, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_once;
    use crate::record::WASM_MODULE_TAG;

    fn record() -> CacheRecord {
        CacheRecord::new(WASM_MODULE_TAG, &digest_once(b"wire"), b"artifact").unwrap()
    }

    #[test]
    fn test_file_hit_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileStore::new(dir.path()).unwrap();
        let key = CacheLookupKey::new(WASM_MODULE_TAG, "module");
        file.store(&key, record()).unwrap();

        let tiered = TieredStore::new(MemoryStore::new(1024), file);
        assert!(tiered.memory().lookup(&key).unwrap().is_none());

        assert_eq!(tiered.lookup(&key).unwrap(), Some(record()));
        assert_eq!(tiered.memory().lookup(&key).unwrap(), Some(record()));
    }

    #[test]
    fn test_store_and_evict_reach_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let tiered = TieredStore::new(
            MemoryStore::new(1024),
            FileStore::new(dir.path()).unwrap(),
        );
        let key = CacheLookupKey::new(WASM_MODULE_TAG, "module");

        tiered.store(&key, record()).unwrap();
        assert!(tiered.memory().lookup(&key).unwrap().is_some());
        assert!(tiered.file().lookup(&key).unwrap().is_some());

        tiered.evict(&key).unwrap();
        assert!(tiered.memory().lookup(&key).unwrap().is_none());
        assert!(tiered.file().lookup(&key).unwrap().is_none());
    }
}
