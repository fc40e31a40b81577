use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::CacheResult;
use crate::store::{CacheStore, FileStore, MemoryStore, TieredStore};

/// Configuration for the code cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Directory for persistent storage. Memory only if `None`.
    pub disk_cache_path: Option<PathBuf>,
    /// Maximum size of the memory tier in bytes
    pub max_memory_cache_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disk_cache_path: None,
            max_memory_cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl CacheConfig {
    /// Enable or disable caching
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Persist records under `path`
    pub fn with_disk_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_cache_path = Some(path.into());
        self
    }

    /// Set the memory tier capacity in bytes
    pub fn with_max_memory_cache_size(mut self, bytes: u64) -> Self {
        self.max_memory_cache_size = bytes;
        self
    }
}

/// Open the store described by `config`.
///
/// Returns `None` when caching is disabled, a memory store when no disk path
/// is configured, and a memory-over-file tiered store otherwise. A memory
/// size of zero drops the memory tier: only the file store is used, or no
/// store at all without a disk path.
pub fn open_store(config: &CacheConfig) -> CacheResult<Option<Arc<dyn CacheStore>>> {
    if !config.enabled {
        debug!("Code cache disabled");
        return Ok(None);
    }

    // A zero-sized memory tier is left out rather than built
    let memory = (config.max_memory_cache_size > 0)
        .then(|| MemoryStore::new(config.max_memory_cache_size));
    let store: Arc<dyn CacheStore> = match (&config.disk_cache_path, memory) {
        (Some(path), Some(memory)) => Arc::new(TieredStore::new(memory, FileStore::new(path)?)),
        (Some(path), None) => Arc::new(FileStore::new(path)?),
        (None, Some(memory)) => Arc::new(memory),
        (None, None) => {
            debug!("No memory capacity and no disk path, code cache disabled");
            return Ok(None);
        }
    };
    Ok(Some(store))
}
