//! # Execution Contexts
//!
//! A compile request is made on behalf of an execution context: a window, a
//! worker or a worklet. The context owns the code cache host and runs on a
//! specific thread whose [`TaskRunner`] is the only way to reach it from
//! elsewhere. Work posted from other threads holds a [`ContextHandle`], which
//! does not keep the context alive and is resolved only when the work runs.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use code_cache::CacheStore;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A unit of work posted to a context thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posting half of a single-threaded task queue
#[derive(Clone)]
pub struct TaskRunner {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskRunner {
    /// Create a runner and the queue its tasks arrive on
    pub fn new(name: impl Into<Arc<str>>) -> (TaskRunner, TaskQueue) {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        (
            TaskRunner {
                name: name.clone(),
                tx,
            },
            TaskQueue { name, rx },
        )
    }

    /// Post `task` to the owning thread.
    ///
    /// Returns `false` if the queue has shut down; the task is dropped.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let posted = self.tx.send(Box::new(task)).is_ok();
        if !posted {
            debug!(runner = %self.name, "Task queue closed, dropping task");
        }
        posted
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if both runners post to the same queue
    pub fn same_queue(&self, other: &TaskRunner) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner").field("name", &self.name).finish()
    }
}

/// Receiving half of a task queue, drained by the owning thread
pub struct TaskQueue {
    name: Arc<str>,
    rx: mpsc::UnboundedReceiver<Task>,
}

impl TaskQueue {
    /// Run every task queued so far without waiting. Returns how many ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(runner = %self.name, ran, "Drained task queue");
        }
        ran
    }

    /// Run tasks as they arrive until every runner is dropped
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            task();
        }
        debug!(runner = %self.name, "Task queue finished");
    }
}

/// Where a context runs
#[derive(Debug, Clone)]
pub enum ContextKind {
    /// A document window on the main thread
    Window,
    /// A dedicated or shared worker on its own backing thread
    Worker { thread: TaskRunner },
    /// A worklet. `thread` is `None` for worklets that run on the main thread.
    Worklet { thread: Option<TaskRunner> },
}

/// The context a compile request was made from
pub struct ExecutionContext {
    kind: ContextKind,
    origin: String,
    main_thread: TaskRunner,
    code_cache_host: Option<Arc<dyn CacheStore>>,
    valid: AtomicBool,
}

impl ExecutionContext {
    pub fn new(kind: ContextKind, origin: impl Into<String>, main_thread: TaskRunner) -> Self {
        Self {
            kind,
            origin: origin.into(),
            main_thread,
            code_cache_host: None,
            valid: AtomicBool::new(true),
        }
    }

    /// Attach the store compiled modules are written to
    pub fn with_code_cache_host(mut self, host: Arc<dyn CacheStore>) -> Self {
        self.code_cache_host = Some(host);
        self
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn code_cache_host(&self) -> Option<&Arc<dyn CacheStore>> {
        self.code_cache_host.as_ref()
    }

    /// The runner for the thread this context lives on
    pub fn task_runner(&self) -> TaskRunner {
        match &self.kind {
            ContextKind::Window => self.main_thread.clone(),
            ContextKind::Worker { thread } => thread.clone(),
            ContextKind::Worklet { thread: Some(thread) } => thread.clone(),
            ContextKind::Worklet { thread: None } => self.main_thread.clone(),
        }
    }

    /// Whether the context can still run script
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Detach the context. Handles stop resolving from now on.
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            debug!(origin = %self.origin, "Execution context invalidated");
        }
    }

    /// A non-owning handle to this context
    pub fn handle(self: &Arc<Self>) -> ContextHandle {
        ContextHandle(Arc::downgrade(self))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("has_code_cache_host", &self.code_cache_host.is_some())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Weak, liveness-checked reference to an [`ExecutionContext`]
#[derive(Debug, Clone, Default)]
pub struct ContextHandle(Weak<ExecutionContext>);

impl ContextHandle {
    /// A handle that never resolves
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    /// The context, if it is still alive and valid
    pub fn get(&self) -> Option<Arc<ExecutionContext>> {
        self.0.upgrade().filter(|context| context.is_valid())
    }

    pub fn is_valid(&self) -> bool {
        self.get().is_some()
    }
}
