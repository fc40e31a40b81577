//! # Streaming Ingestor
//!
//! Pulls module bytes from a [`ByteSource`] and forwards them to the
//! compiler. While a cached artifact is being validated the same bytes feed
//! the session's digest. At end of stream the resolver's verdict is passed to
//! the compiler's finalize; on a source error, a cancel or a client abort the
//! compiler is aborted instead. Exactly one of the two ever happens.
//!
//! The ingestor is driven synchronously by whoever delivers chunks. It
//! suspends only when the source has nothing ready and resumes on
//! [`on_readable`](StreamingIngestor::on_readable).
//!
//! Terminal calls to the compiler and the sink are collected as a
//! [`Completion`] while the session state is updated and delivered
//! afterwards, so a shared [`IngestorHandle`] is never locked while they run.

use std::sync::Arc;

use code_cache::DigestAccumulator;
use parking_lot::Mutex;
use tracing::{Span, debug, debug_span, trace};

use crate::abort::AbortBridge;
use crate::compiler::{AbortReason, CompletionToken};
use crate::context::ContextHandle;
use crate::error::{SourceError, StreamingError};
use crate::resolver::{CacheValidityResolver, ValidityState};
use crate::source::{ByteSource, EndReadResult, ReadResult};

/// Receives the terminal outcome of a session
pub trait CompletionSink: Send {
    /// The stream was fully consumed and the compiler finalized
    fn on_done(&mut self);

    /// The compiler was aborted
    fn on_aborted(&mut self, reason: &AbortReason);
}

/// Sink for callers that do not need completion notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreCompletion;

impl CompletionSink for IgnoreCompletion {
    fn on_done(&mut self) {}

    fn on_aborted(&mut self, _reason: &AbortReason) {}
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished { trusted: bool },
    Aborted(AbortReason),
}

/// Terminal calls owed to the compiler and the sink once a session ends
#[must_use]
struct Completion {
    token: Option<CompletionToken>,
    sink: Option<Box<dyn CompletionSink>>,
    outcome: SessionOutcome,
    span: Span,
}

impl Completion {
    fn deliver(self) {
        let Completion {
            token,
            sink,
            outcome,
            span,
        } = self;
        let _enter = span.enter();

        match outcome {
            SessionOutcome::Finished { trusted } => {
                if let Some(token) = token {
                    token.finalize(trusted);
                }
                if let Some(mut sink) = sink {
                    sink.on_done();
                }
            }
            SessionOutcome::Aborted(reason) => {
                if let Some(token) = token {
                    let mut bridge = AbortBridge::new(token);
                    bridge.set_reason(reason.clone());
                    bridge.finish();
                }
                if let Some(mut sink) = sink {
                    sink.on_aborted(&reason);
                }
            }
        }
    }
}

/// What caused an abort, before it is turned into an [`AbortReason`]
enum AbortCause {
    Source(SourceError),
    Cancelled,
    Client,
}

pub struct StreamingIngestor {
    url: String,
    context: ContextHandle,
    token: Option<CompletionToken>,
    resolver: CacheValidityResolver,
    digest: DigestAccumulator,
    source: Option<Box<dyn ByteSource>>,
    sink: Option<Box<dyn CompletionSink>>,
    bytes_received: u64,
    outcome: Option<SessionOutcome>,
    span: Span,
}

impl StreamingIngestor {
    pub fn new(
        url: impl Into<String>,
        token: CompletionToken,
        resolver: CacheValidityResolver,
        context: ContextHandle,
    ) -> Self {
        let url = url.into();
        let span = debug_span!("wasm_stream", url = %url);
        Self {
            url,
            context,
            token: Some(token),
            resolver,
            digest: DigestAccumulator::new(),
            source: None,
            sink: None,
            bytes_received: 0,
            outcome: None,
            span,
        }
    }

    /// Begin consuming `source`, reporting the outcome to `sink`
    pub fn start(&mut self, source: Box<dyn ByteSource>, sink: Box<dyn CompletionSink>) {
        if let Some(completion) = self.begin(source, sink) {
            completion.deliver();
        }
    }

    /// The source may have more data; consume until it must wait or ends
    pub fn on_readable(&mut self) {
        if let Some(completion) = self.pump() {
            completion.deliver();
        }
    }

    /// Stop early. Idempotent; does nothing once the session has ended.
    pub fn cancel(&mut self) {
        if let Some(completion) = self.stop(AbortCause::Cancelled) {
            completion.deliver();
        }
    }

    /// The requester gave up on the compilation
    pub fn abort_from_client(&mut self) {
        if let Some(completion) = self.stop(AbortCause::Client) {
            completion.deliver();
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn validity_state(&self) -> ValidityState {
        self.resolver.state()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    fn begin(
        &mut self,
        source: Box<dyn ByteSource>,
        sink: Box<dyn CompletionSink>,
    ) -> Option<Completion> {
        if self.source.is_some() || self.outcome.is_some() {
            debug!(parent: &self.span, "Ingestor already started, ignoring start");
            return None;
        }
        self.source = Some(source);
        self.sink = Some(sink);
        self.pump()
    }

    fn pump(&mut self) -> Option<Completion> {
        let span = self.span.clone();
        let _enter = span.enter();

        loop {
            let (Some(source), Some(token)) = (self.source.as_mut(), self.token.as_ref()) else {
                return None;
            };

            let result = match source.begin_read() {
                ReadResult::ShouldWait => {
                    trace!("Source not ready, suspending");
                    return None;
                }
                ReadResult::Ready(chunk) => {
                    if !chunk.is_empty() {
                        let state = self.resolver.decide(token.compiler());
                        if state == ValidityState::UsingCache {
                            self.digest.update(&chunk);
                        }
                        token.compiler().feed(&chunk);
                        self.bytes_received += chunk.len() as u64;
                    }
                    source.end_read(chunk.len())
                }
                ReadResult::Done => EndReadResult::Done,
                ReadResult::Error(e) => EndReadResult::Error(e),
            };

            match result {
                EndReadResult::Ok => continue,
                EndReadResult::Done => return Some(self.finish()),
                EndReadResult::Error(e) => return Some(self.abort(AbortCause::Source(e))),
            }
        }
    }

    fn stop(&mut self, cause: AbortCause) -> Option<Completion> {
        let _enter = self.span.clone().entered();
        if self.is_terminal() {
            return None;
        }
        if let Some(source) = self.source.as_mut() {
            source.cancel();
        }
        Some(self.abort(cause))
    }

    fn finish(&mut self) -> Completion {
        let trusted = self.resolver.confirm(&mut self.digest);
        debug!(
            bytes = self.bytes_received,
            state = ?self.resolver.state(),
            trusted,
            "Stream finished"
        );
        self.complete(SessionOutcome::Finished { trusted })
    }

    fn abort(&mut self, cause: AbortCause) -> Completion {
        let reason = match cause {
            AbortCause::Client => AbortReason::Error(StreamingError::Aborted),
            // Without a usable context nothing may observe the failure
            _ if !self.context.is_valid() => AbortReason::Silent,
            AbortCause::Source(e) => AbortReason::Error(StreamingError::SourceRead(e)),
            AbortCause::Cancelled => AbortReason::Error(StreamingError::DownloadFailed),
        };
        debug!(bytes = self.bytes_received, reason = ?reason, "Stream aborted");
        self.complete(SessionOutcome::Aborted(reason))
    }

    fn complete(&mut self, outcome: SessionOutcome) -> Completion {
        self.source = None;
        self.outcome = Some(outcome.clone());
        Completion {
            token: self.token.take(),
            sink: self.sink.take(),
            outcome,
            span: self.span.clone(),
        }
    }
}

/// Shareable handle to an ingestor.
///
/// Readiness notifications and cancellation may come from different
/// threads; the handle serializes them. The compiler and the sink are called
/// after the handle is unlocked and may query or drive it again. A source
/// must not call back into the handle from inside `begin_read` or `end_read`.
#[derive(Clone)]
pub struct IngestorHandle {
    inner: Arc<Mutex<StreamingIngestor>>,
}

impl IngestorHandle {
    pub fn new(ingestor: StreamingIngestor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ingestor)),
        }
    }

    pub fn start(&self, source: Box<dyn ByteSource>, sink: Box<dyn CompletionSink>) {
        let completion = self.inner.lock().begin(source, sink);
        if let Some(completion) = completion {
            completion.deliver();
        }
    }

    pub fn on_readable(&self) {
        let completion = self.inner.lock().pump();
        if let Some(completion) = completion {
            completion.deliver();
        }
    }

    pub fn cancel(&self) {
        let completion = self.inner.lock().stop(AbortCause::Cancelled);
        if let Some(completion) = completion {
            completion.deliver();
        }
    }

    pub fn abort_from_client(&self) {
        let completion = self.inner.lock().stop(AbortCause::Client);
        if let Some(completion) = completion {
            completion.deliver();
        }
    }

    pub fn validity_state(&self) -> ValidityState {
        self.inner.lock().validity_state()
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.inner.lock().outcome().cloned()
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.lock().is_terminal()
    }
}
