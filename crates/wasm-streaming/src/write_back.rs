//! # Cache Write-Back
//!
//! The compiler reports a finished module on one of its own threads,
//! independently of how ingestion ended. [`WriteBackClient`] decides whether
//! the module is worth caching, builds the record there, and posts it to the
//! owning context's task runner. Only the finished record crosses threads;
//! the store is touched on the context thread, and only if the context still
//! exists when the task runs.

use bytes::Bytes;
use code_cache::{CacheLookupKey, CacheRecord, digest_once};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::compiler::CompiledModule;
use crate::context::{ContextHandle, TaskRunner};

/// What [`WriteBackClient::on_artifact_ready`] did with a compiled module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBackOutcome {
    /// A store task was posted to the owning context
    Posted,
    /// The wire bytes are too small for caching to pay off
    BelowThreshold,
    /// The compiler produced no serialized form
    SerializationRefused,
    /// The artifact could not be framed as a record
    RecordTooLarge,
    /// The owning context's task queue has shut down
    RunnerClosed,
}

pub struct WriteBackClient {
    url: String,
    key: CacheLookupKey,
    min_wire_bytes: usize,
    runner: TaskRunner,
    context: ContextHandle,
    cached_record: Mutex<Option<CacheRecord>>,
}

impl WriteBackClient {
    pub fn new(
        url: impl Into<String>,
        key: CacheLookupKey,
        min_wire_bytes: usize,
        runner: TaskRunner,
        context: ContextHandle,
    ) -> Self {
        Self {
            url: url.into(),
            key,
            min_wire_bytes,
            runner,
            context,
            cached_record: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn key(&self) -> &CacheLookupKey {
        &self.key
    }

    /// Keep a cached record alive for as long as the compiler may read it
    pub fn retain_cached_record(&self, record: CacheRecord) {
        *self.cached_record.lock() = Some(record);
    }

    /// Drop the retained record once it is known to be unusable
    pub fn release_cached_record(&self) {
        *self.cached_record.lock() = None;
    }

    pub fn retained_record(&self) -> Option<CacheRecord> {
        self.cached_record.lock().clone()
    }

    /// Called by the compiler, on any thread, once `module` is compiled
    pub fn on_artifact_ready(&self, module: &dyn CompiledModule) -> WriteBackOutcome {
        let wire_bytes = module.wire_bytes();
        debug!(url = %self.url, wire_bytes = wire_bytes.len(), "Compiled module ready");

        if wire_bytes.len() < self.min_wire_bytes {
            debug!(
                wire_bytes = wire_bytes.len(),
                threshold = self.min_wire_bytes,
                "Module too small to cache"
            );
            return WriteBackOutcome::BelowThreshold;
        }

        let serialized: Bytes = module.serialize();
        if serialized.is_empty() {
            debug!(url = %self.url, "Compiler declined to serialize module");
            return WriteBackOutcome::SerializationRefused;
        }

        let digest = digest_once(wire_bytes);
        let record = match CacheRecord::new(self.key.tag(), &digest, &serialized) {
            Ok(record) => record,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Cannot build cache record");
                return WriteBackOutcome::RecordTooLarge;
            }
        };

        info!(
            url = %self.url,
            produced_cache_size = serialized.len(),
            digest = %digest,
            "Caching compiled module"
        );

        let context = self.context.clone();
        let key = self.key.clone();
        let url = self.url.clone();
        if self
            .runner
            .post_task(move || send_cached_data(&url, &context, &key, record))
        {
            WriteBackOutcome::Posted
        } else {
            WriteBackOutcome::RunnerClosed
        }
    }
}

/// Runs on the owning context's thread
fn send_cached_data(url: &str, context: &ContextHandle, key: &CacheLookupKey, record: CacheRecord) {
    let Some(context) = context.get() else {
        debug!(url, "Owning context gone, dropping compiled module");
        return;
    };
    let Some(host) = context.code_cache_host() else {
        debug!(url, "Context has no code cache host");
        return;
    };

    match host.store(key, record) {
        Ok(()) => debug!(url, "Stored compiled module"),
        Err(e) => warn!(url, error = %e, "Failed to store compiled module"),
    }
}
