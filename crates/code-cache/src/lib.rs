//! # Code Cache
//!
//! Persistent storage for compiled module artifacts, keyed by the resource
//! they were compiled from and stamped with the SHA-256 digest of the wire
//! bytes that produced them.
//!
//! ## Features
//!
//! - Incremental and one-shot wire byte digests
//! - A fixed binary record layout with a schema tag
//! - Memory, file and tiered stores behind a single [`CacheStore`] trait
//! - Stale schema generations read back as misses

pub mod config;
pub mod digest;
pub mod error;
pub mod key;
pub mod record;
pub mod store;

pub use config::{CacheConfig, open_store};
pub use digest::{DIGEST_SIZE, DigestAccumulator, WireDigest, digest_once};
pub use error::{CacheError, CacheResult, RecordError};
pub use key::CacheLookupKey;
pub use record::{
    CacheRecord, DecodedRecord, HEADER_SIZE, RETIRED_WASM_MODULE_TAG, WASM_MODULE_TAG, decode,
    encode,
};
pub use store::{CacheStore, FileStore, MemoryStore, TieredStore};
