//! # Cache Stores
//!
//! This module contains the [`CacheStore`] trait and its implementations.

pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::provider::CacheStore;
pub use self::tiered::TieredStore;

// Store interface
pub mod provider;

// Individual store implementations
pub mod file;
pub mod memory;
pub mod tiered;
