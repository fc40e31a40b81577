//! # Cache Validity
//!
//! Whether a stored artifact may be used can only be proven once every wire
//! byte has been hashed, but the compiler wants to know as early as possible
//! whether it should try. The decision is therefore split in two:
//!
//! - [`decide`](CacheValidityResolver::decide) runs on the first non-empty
//!   chunk. It looks the record up, checks its shape and offers the artifact
//!   to the compiler.
//! - [`confirm`](CacheValidityResolver::confirm) runs at end of stream and
//!   compares the digest of the streamed bytes with the stored one.
//!
//! Any record that fails either step is evicted.

use std::sync::Arc;

use code_cache::{CacheLookupKey, CacheRecord, CacheStore, DigestAccumulator};
use tracing::{debug, info, warn};

use crate::compiler::Compiler;
use crate::write_back::WriteBackClient;

/// Whether the session is validating a cached artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityState {
    /// No bytes seen yet
    BeforeFirstByte,
    /// A candidate artifact was accepted and the stream is being hashed
    UsingCache,
    /// Compiling without a cached artifact
    NoCache,
}

/// Why a stored record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Too short to hold a digest
    Malformed,
    /// The compiler refused the artifact
    IncompatibleArtifact,
    /// Hashing the stream failed
    HashingFailed,
    /// The stream does not hash to the stored digest
    DigestMismatch,
}

pub struct CacheValidityResolver {
    key: CacheLookupKey,
    store: Option<Arc<dyn CacheStore>>,
    write_back: Option<Arc<WriteBackClient>>,
    state: ValidityState,
    retained: Option<CacheRecord>,
    rejection: Option<Rejection>,
}

impl CacheValidityResolver {
    /// A resolver that looks records up in `store`.
    ///
    /// Accepted records are also handed to `write_back` so they outlive the
    /// session while the compiler may still read them.
    pub fn new(
        key: CacheLookupKey,
        store: Option<Arc<dyn CacheStore>>,
        write_back: Option<Arc<WriteBackClient>>,
    ) -> Self {
        Self {
            key,
            store,
            write_back,
            state: ValidityState::BeforeFirstByte,
            retained: None,
            rejection: None,
        }
    }

    /// A resolver with no store; every session compiles without a cache
    pub fn disabled(key: CacheLookupKey) -> Self {
        Self::new(key, None, None)
    }

    pub fn state(&self) -> ValidityState {
        self.state
    }

    pub fn key(&self) -> &CacheLookupKey {
        &self.key
    }

    /// The record being validated, if any
    pub fn retained_record(&self) -> Option<&CacheRecord> {
        self.retained.as_ref()
    }

    /// Why the last candidate was rejected, if one was
    pub fn rejection(&self) -> Option<Rejection> {
        self.rejection
    }

    /// Fix the validity state from the stored record. Only the first call
    /// does any work.
    pub fn decide(&mut self, compiler: &dyn Compiler) -> ValidityState {
        if self.state == ValidityState::BeforeFirstByte {
            self.state = self.lookup_candidate(compiler);
        }
        self.state
    }

    fn lookup_candidate(&mut self, compiler: &dyn Compiler) -> ValidityState {
        let Some(store) = self.store.clone() else {
            return ValidityState::NoCache;
        };

        let record = match store.lookup(&self.key) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No cached module");
                return ValidityState::NoCache;
            }
            Err(e) => {
                warn!(error = %e, "Code cache lookup failed, compiling without cache");
                return ValidityState::NoCache;
            }
        };

        info!(consumed_cache_size = record.body_len(), "Module cache hit");

        let rejection = match record.artifact() {
            None => Some(Rejection::Malformed),
            Some(artifact) if !compiler.try_preload_candidate(artifact) => {
                Some(Rejection::IncompatibleArtifact)
            }
            Some(_) => None,
        };

        if let Some(rejection) = rejection {
            warn!(?rejection, "Cached module invalid, evicting");
            self.reject(store.as_ref(), rejection);
            return ValidityState::NoCache;
        }

        if let Some(write_back) = &self.write_back {
            write_back.retain_cached_record(record.clone());
        }
        self.retained = Some(record);
        ValidityState::UsingCache
    }

    /// Final trust verdict for the session.
    ///
    /// Finishes `digest` when a candidate is being validated. Without one the
    /// verdict is `false` and `digest` is left untouched. A rejected candidate
    /// is evicted but the validity state stays `UsingCache`; the verdict is
    /// carried by the return value and [`rejection`](Self::rejection).
    pub fn confirm(&mut self, digest: &mut DigestAccumulator) -> bool {
        if self.state != ValidityState::UsingCache {
            return false;
        }
        let Some(record) = self.retained.as_ref() else {
            return false;
        };
        let Some(stored) = record.digest() else {
            return false;
        };

        let computed = digest.finish();
        let rejection = match computed {
            _ if digest.has_failed() => Some(Rejection::HashingFailed),
            None => Some(Rejection::HashingFailed),
            Some(computed) if computed != stored => Some(Rejection::DigestMismatch),
            Some(_) => None,
        };

        match rejection {
            Some(rejection) => {
                warn!(
                    ?rejection,
                    stored = %stored,
                    computed = ?computed,
                    "Cached module digest invalid, evicting"
                );
                if let Some(store) = self.store.clone() {
                    self.reject(store.as_ref(), rejection);
                }
                false
            }
            None => {
                debug!(digest = %stored, "Cached module digest confirmed");
                true
            }
        }
    }

    fn reject(&mut self, store: &dyn CacheStore, rejection: Rejection) {
        self.rejection = Some(rejection);
        self.retained = None;
        if let Some(write_back) = &self.write_back {
            write_back.release_cached_record();
        }
        if let Err(e) = store.evict(&self.key) {
            warn!(error = %e, "Failed to evict invalid cached module");
        }
    }
}
