//! # Compiler Contract
//!
//! The compiler is an opaque engine that accepts module bytes incrementally
//! and compiles them on its own threads. This module defines the narrow
//! surface the streaming pipeline drives, and the [`CompletionToken`] that
//! makes its terminal calls linear: a token is spent by exactly one of
//! [`finalize`](CompletionToken::finalize) or [`abort`](CompletionToken::abort).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::StreamingError;
use crate::write_back::WriteBackClient;

/// Why a compilation is being aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Reject the compilation with this error
    Error(StreamingError),
    /// Fail the compilation without producing a user-visible error. Used
    /// when the requesting context can no longer run script.
    Silent,
}

impl From<StreamingError> for AbortReason {
    fn from(error: StreamingError) -> Self {
        AbortReason::Error(error)
    }
}

/// The operations the streaming pipeline needs from a compiler
pub trait Compiler: Send + Sync {
    /// Record the URL the module was fetched from
    fn set_url(&self, _url: &str) {}

    /// Register the client to notify once a compiled artifact is ready.
    ///
    /// The compiler calls [`WriteBackClient::on_artifact_ready`] at most once,
    /// from any thread.
    fn set_client(&self, _client: Arc<WriteBackClient>) {}

    /// Deliver the next run of wire bytes
    fn feed(&self, bytes: &[u8]);

    /// Offer a previously cached artifact. Returns `false` if the artifact is
    /// incompatible with this compiler.
    fn try_preload_candidate(&self, artifact: &[u8]) -> bool;

    /// All wire bytes have been delivered. `trust_cache` tells the compiler
    /// whether a preloaded candidate matches the bytes it was given.
    fn finalize(&self, trust_cache: bool);

    /// Fail the outstanding compilation
    fn abort(&self, reason: AbortReason);
}

/// A compiled module as handed back by the compiler
pub trait CompiledModule {
    /// The complete wire bytes the module was compiled from
    fn wire_bytes(&self) -> &[u8];

    /// Serialize the compiled form. An empty buffer means the compiler
    /// declined to serialize this module.
    fn serialize(&self) -> Bytes;
}

/// Single-use right to end a compilation.
///
/// Dropping an unspent token delivers a silent abort, so the compiler is
/// never left waiting for a terminal call.
pub struct CompletionToken {
    compiler: Arc<dyn Compiler>,
    spent: bool,
}

impl CompletionToken {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            spent: false,
        }
    }

    /// The compiler this token ends
    pub fn compiler(&self) -> &dyn Compiler {
        self.compiler.as_ref()
    }

    pub fn finalize(mut self, trust_cache: bool) {
        self.spent = true;
        debug!(trust_cache, "Finalizing streaming compilation");
        self.compiler.finalize(trust_cache);
    }

    pub fn abort(mut self, reason: AbortReason) {
        self.spent = true;
        debug!(reason = ?reason, "Aborting streaming compilation");
        self.compiler.abort(reason);
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.spent {
            warn!("Completion token dropped unspent, aborting compilation silently");
            self.compiler.abort(AbortReason::Silent);
        }
    }
}

impl fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionToken")
            .field("spent", &self.spent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CompilerEvent, RecordingCompiler};

    #[test]
    fn test_finalize_spends_token() {
        let compiler = Arc::new(RecordingCompiler::new());
        let token = CompletionToken::new(compiler.clone());
        token.compiler().feed(b"abc");
        token.finalize(true);

        assert_eq!(
            compiler.events(),
            vec![CompilerEvent::Feed(b"abc".to_vec()), CompilerEvent::Finalize(true)]
        );
    }

    #[test]
    fn test_abort_spends_token() {
        let compiler = Arc::new(RecordingCompiler::new());
        CompletionToken::new(compiler.clone()).abort(StreamingError::Aborted.into());

        assert_eq!(
            compiler.terminal_events(),
            vec![CompilerEvent::Abort(AbortReason::Error(StreamingError::Aborted))]
        );
    }

    #[test]
    fn test_unspent_token_aborts_silently() {
        let compiler = Arc::new(RecordingCompiler::new());
        drop(CompletionToken::new(compiler.clone()));

        assert_eq!(
            compiler.terminal_events(),
            vec![CompilerEvent::Abort(AbortReason::Silent)]
        );
    }

    #[test]
    #[should_panic(expected = "second terminal call")]
    fn test_second_terminal_call_is_caught() {
        let compiler = Arc::new(RecordingCompiler::new());
        CompletionToken::new(compiler.clone()).finalize(true);
        CompletionToken::new(compiler.clone()).abort(AbortReason::Silent);
    }
}
