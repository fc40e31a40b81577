//! # Wasm Streaming
//!
//! Streaming compilation of WebAssembly modules fetched over the network,
//! backed by a digest-validated code cache.
//!
//! Module bytes are handed to the compiler as they arrive. When the response
//! carries a code cache, a previously compiled artifact is offered to the
//! compiler on the first byte and trusted only if the SHA-256 digest of the
//! full stream matches the one stored with it. Freshly compiled modules are
//! written back from the owning context's thread.
//!
//! ## Features
//!
//! - Chunk-boundary independent ingestion with suspend and resume
//! - Exactly one finalize or abort per compilation, enforced by a
//!   single-use completion token
//! - Stale or corrupt cache entries are evicted on sight
//! - Write-back that survives the owning context going away

pub mod abort;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod ingestor;
pub mod resolver;
pub mod response;
pub mod source;
pub mod write_back;

#[cfg(test)]
pub(crate) mod test_utils;

pub use abort::AbortBridge;
pub use builder::StreamingConfigBuilder;
pub use compiler::{AbortReason, CompiledModule, Compiler, CompletionToken};
pub use config::StreamingConfig;
pub use context::{ContextHandle, ContextKind, ExecutionContext, TaskQueue, TaskRunner};
pub use error::{SetupError, SourceError, StreamingError};
pub use ingestor::{
    CompletionSink, IgnoreCompletion, IngestorHandle, SessionOutcome, StreamingIngestor,
};
pub use resolver::{CacheValidityResolver, Rejection, ValidityState};
pub use response::{Response, WASM_MIME_TYPE, stream_from_response};
pub use source::{ByteSource, ChannelSource, ChunkSender, ChunkedSource, EndReadResult, ReadResult};
pub use write_back::{WriteBackClient, WriteBackOutcome};
