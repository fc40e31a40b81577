//! # Cache Store
//!
//! This module defines the trait every record store implements.

use crate::error::CacheResult;
use crate::key::CacheLookupKey;
use crate::record::CacheRecord;

/// Storage for at most one record per key scope.
///
/// `store` and `evict` belong to the context that owns the store; callers on
/// other threads post work to that context instead of calling them directly.
pub trait CacheStore: Send + Sync {
    /// Find the record stored under `key`.
    ///
    /// A record whose tag differs from `key.tag()` is reported as absent.
    fn lookup(&self, key: &CacheLookupKey) -> CacheResult<Option<CacheRecord>>;

    /// Drop whatever is stored under `key`'s scope
    fn evict(&self, key: &CacheLookupKey) -> CacheResult<()>;

    /// Store `record` under `key`'s scope, replacing any previous record
    fn store(&self, key: &CacheLookupKey, record: CacheRecord) -> CacheResult<()>;
}
