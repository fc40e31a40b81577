//! # Memory Store
//!
//! This module provides an in-memory record store using Moka caching.

use bytes::Bytes;
use moka::sync::Cache as MokaCache;
use tracing::{debug, warn};

use crate::error::CacheResult;
use crate::key::CacheLookupKey;
use crate::record::CacheRecord;
use crate::store::CacheStore;

/// Size-bounded in-memory store
#[derive(Clone)]
pub struct MemoryStore {
    cache: MokaCache<Bytes, CacheRecord>,
    max_size: u64,
}

impl MemoryStore {
    /// Create a new memory store holding at most `max_size_bytes` of records
    pub fn new(max_size_bytes: u64) -> Self {
        if max_size_bytes == 0 {
            panic!("Memory store size must be greater than zero");
        }

        let cache = MokaCache::builder()
            .weigher(|_k, v: &CacheRecord| v.as_bytes().len().try_into().unwrap_or(u32::MAX))
            .max_capacity(max_size_bytes)
            .build();

        debug!(max_size = max_size_bytes, "Memory store created");

        Self {
            cache,
            max_size: max_size_bytes,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of records currently held
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn lookup(&self, key: &CacheLookupKey) -> CacheResult<Option<CacheRecord>> {
        let Some(record) = self.cache.get(key.scope()) else {
            return Ok(None);
        };

        if record.tag() != key.tag() {
            debug!(
                stored_tag = record.tag(),
                wanted_tag = key.tag(),
                "Memory store record has a different tag, treating as miss"
            );
            return Ok(None);
        }

        Ok(Some(record))
    }

    fn evict(&self, key: &CacheLookupKey) -> CacheResult<()> {
        if self.cache.remove(key.scope()).is_some() {
            debug!(key = %key.to_filename(), "Evicted record from memory store");
        }
        Ok(())
    }

    fn store(&self, key: &CacheLookupKey, record: CacheRecord) -> CacheResult<()> {
        let size = record.as_bytes().len() as u64;

        // A single record shouldn't be larger than the whole store
        if size > self.max_size {
            warn!(
                key = %key.to_filename(),
                size = size,
                max_size = self.max_size,
                "Record too large for memory store, skipping"
            );
            return Ok(());
        }

        self.cache.insert(key.scope().clone(), record);
        Ok(())
    }
}
