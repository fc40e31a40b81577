//! Test doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::compiler::{AbortReason, CompiledModule, Compiler};
use crate::ingestor::CompletionSink;
use crate::source::{ByteSource, EndReadResult, ReadResult};
use crate::write_back::{WriteBackClient, WriteBackOutcome};
use crate::error::SourceError;

/// Macro to initialize tracing for tests
///
/// Usage:
/// - `init_test_tracing!()` - uses DEBUG level (default)
/// - `init_test_tracing!(INFO)` - uses specified level
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        $crate::init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerEvent {
    Feed(Vec<u8>),
    Preload(Vec<u8>),
    Finalize(bool),
    Abort(AbortReason),
}

impl CompilerEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, CompilerEvent::Finalize(_) | CompilerEvent::Abort(_))
    }
}

/// Compiler that records every call and panics on a second terminal call
#[derive(Default)]
pub struct RecordingCompiler {
    events: Mutex<Vec<CompilerEvent>>,
    url: Mutex<Option<String>>,
    client: Mutex<Option<Arc<WriteBackClient>>>,
    write_back: Mutex<Option<WriteBackOutcome>>,
    reject_candidates: bool,
    artifact: Option<Vec<u8>>,
    terminated: AtomicBool,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every cached artifact offered for preloading
    pub fn rejecting_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    /// On finalize, hand a module serializing to `artifact` to the
    /// registered write-back client
    pub fn producing_artifact(mut self, artifact: impl Into<Vec<u8>>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    pub fn events(&self) -> Vec<CompilerEvent> {
        self.events.lock().clone()
    }

    pub fn terminal_events(&self) -> Vec<CompilerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.is_terminal())
            .cloned()
            .collect()
    }

    /// Every fed chunk concatenated
    pub fn fed_bytes(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                CompilerEvent::Feed(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    pub fn url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    pub fn client(&self) -> Option<Arc<WriteBackClient>> {
        self.client.lock().clone()
    }

    pub fn write_back_outcome(&self) -> Option<WriteBackOutcome> {
        *self.write_back.lock()
    }

    fn terminate(&self, event: CompilerEvent) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            panic!("second terminal call: {event:?}");
        }
        self.events.lock().push(event);
    }
}

impl Compiler for RecordingCompiler {
    fn set_url(&self, url: &str) {
        *self.url.lock() = Some(url.to_string());
    }

    fn set_client(&self, client: Arc<WriteBackClient>) {
        *self.client.lock() = Some(client);
    }

    fn feed(&self, bytes: &[u8]) {
        assert!(!self.terminated.load(Ordering::SeqCst), "feed after terminal call");
        self.events.lock().push(CompilerEvent::Feed(bytes.to_vec()));
    }

    fn try_preload_candidate(&self, artifact: &[u8]) -> bool {
        self.events
            .lock()
            .push(CompilerEvent::Preload(artifact.to_vec()));
        !self.reject_candidates
    }

    fn finalize(&self, trust_cache: bool) {
        self.terminate(CompilerEvent::Finalize(trust_cache));

        let (Some(artifact), Some(client)) = (self.artifact.clone(), self.client()) else {
            return;
        };
        let module = TestModule::new(self.fed_bytes(), artifact);
        *self.write_back.lock() = Some(client.on_artifact_ready(&module));
    }

    fn abort(&self, reason: AbortReason) {
        self.terminate(CompilerEvent::Abort(reason));
    }
}

pub struct TestModule {
    wire: Vec<u8>,
    serialized: Bytes,
    was_serialized: AtomicBool,
}

impl TestModule {
    pub fn new(wire: Vec<u8>, serialized: Vec<u8>) -> Self {
        Self {
            wire,
            serialized: Bytes::from(serialized),
            was_serialized: AtomicBool::new(false),
        }
    }

    pub fn was_serialized(&self) -> bool {
        self.was_serialized.load(Ordering::SeqCst)
    }
}

impl CompiledModule for TestModule {
    fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    fn serialize(&self) -> Bytes {
        self.was_serialized.store(true, Ordering::SeqCst);
        self.serialized.clone()
    }
}

enum Step {
    Ready(Bytes, EndReadResult),
    Wait,
    Error(SourceError),
}

/// Source replaying a fixed script of read results, then `Done`
#[derive(Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(mut self, chunk: &'static [u8]) -> Self {
        self.steps
            .push_back(Step::Ready(Bytes::from_static(chunk), EndReadResult::Ok));
        self
    }

    /// Override what `end_read` reports for the last chunk
    pub fn end_read(mut self, result: EndReadResult) -> Self {
        if let Some(Step::Ready(_, end)) = self.steps.back_mut() {
            *end = result;
        }
        self
    }

    pub fn wait(mut self) -> Self {
        self.steps.push_back(Step::Wait);
        self
    }

    pub fn error(mut self, error: SourceError) -> Self {
        self.steps.push_back(Step::Error(error));
        self
    }

    /// Flag set once the source is cancelled
    pub fn cancelled_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

impl ByteSource for ScriptedSource {
    fn begin_read(&mut self) -> ReadResult {
        match self.steps.front() {
            Some(Step::Ready(chunk, _)) => ReadResult::Ready(chunk.clone()),
            Some(Step::Wait) => {
                self.steps.pop_front();
                ReadResult::ShouldWait
            }
            Some(Step::Error(e)) => ReadResult::Error(e.clone()),
            None => ReadResult::Done,
        }
    }

    fn end_read(&mut self, _consumed: usize) -> EndReadResult {
        match self.steps.pop_front() {
            Some(Step::Ready(_, end)) => end,
            _ => EndReadResult::Ok,
        }
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.steps.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Done,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }
}

impl CompletionSink for RecordingSink {
    fn on_done(&mut self) {
        self.events.lock().push(SinkEvent::Done);
    }

    fn on_aborted(&mut self, reason: &AbortReason) {
        self.events.lock().push(SinkEvent::Aborted(reason.clone()));
    }
}
