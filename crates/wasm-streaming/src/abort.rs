//! # Abort Bridge
//!
//! Every failure during streaming setup, and every cancellation or source
//! error afterwards, has to reach the compiler as an abort so it can reject
//! the pending compilation. [`AbortBridge`] owns the compiler's
//! [`CompletionToken`] while such a failure may still happen. When the bridge
//! is dropped with a failure pending it spends the token on one abort; when
//! the work succeeds the token is released for the ingestor to finalize.

use tracing::debug;

use crate::compiler::{AbortReason, Compiler, CompletionToken};
use crate::error::StreamingError;

pub struct AbortBridge {
    token: Option<CompletionToken>,
    pending: Option<AbortReason>,
}

impl AbortBridge {
    pub fn new(token: CompletionToken) -> Self {
        Self {
            token: Some(token),
            pending: None,
        }
    }

    pub fn compiler(&self) -> Option<&dyn Compiler> {
        self.token.as_ref().map(CompletionToken::compiler)
    }

    /// Record a structured failure. The first recorded reason wins.
    pub fn fail(&mut self, error: impl Into<StreamingError>) {
        self.set_reason(AbortReason::Error(error.into()));
    }

    /// Record that the compilation must fail without a visible error
    pub fn abort_silently(&mut self) {
        self.set_reason(AbortReason::Silent);
    }

    pub fn set_reason(&mut self, reason: AbortReason) {
        if self.pending.is_none() {
            self.pending = Some(reason);
        } else {
            debug!(ignored = ?reason, "Abort already pending, keeping the first reason");
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand the token on if nothing failed.
    ///
    /// With a failure pending the abort is delivered instead and `None` is
    /// returned.
    pub fn release(mut self) -> Option<CompletionToken> {
        if self.pending.is_some() {
            return None;
        }
        self.token.take()
    }

    /// Tear the bridge down now, delivering any pending abort
    pub fn finish(self) {}
}

impl Drop for AbortBridge {
    fn drop(&mut self) {
        let Some(reason) = self.pending.take() else {
            return;
        };
        if let Some(token) = self.token.take() {
            token.abort(reason);
        }
    }
}
