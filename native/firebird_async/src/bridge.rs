/// Suspension bridge between cooperative tasks and blocking calls
///
/// Every blocking driver call made by the adapters goes through [`Bridge::run`].
/// The caller states explicitly which execution mode it is in:
///
/// - [`ExecContext::Cooperative`]: the caller is a task on a tokio scheduler.
///   The call is submitted to a worker thread and the task suspends until it
///   completes, leaving the scheduler free to run other tasks.
/// - [`ExecContext::Inline`]: the caller is a plain blocking thread (for
///   example a synchronous escape hatch that already runs off the scheduler).
///   The call runs on the current thread.
///
/// There is no retry and no cancellation: once submitted, a call runs to
/// completion on its worker even if the awaiting task is dropped.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::utils::safe_lock;

/// Handle to the scheduler loop a cooperative caller runs on.
///
/// Clones share the same "closed" flag, so marking one clone closed is seen
/// by every adapter that captured the loop.
#[derive(Debug, Clone)]
pub struct SchedulerLoop {
    handle: Handle,
    closed: Arc<AtomicBool>,
}

impl SchedulerLoop {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capture the runtime the current thread is running on.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| Error::NoScheduler)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Record that the loop has shut down. Closes issued afterwards park
    /// their handles instead of touching them.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cooperative execution context bound to this loop.
    pub fn context(&self) -> ExecContext {
        ExecContext::Cooperative(self.clone())
    }
}

/// How the caller of a bridged operation is being executed.
#[derive(Debug, Clone)]
pub enum ExecContext {
    Cooperative(SchedulerLoop),
    Inline,
}

impl ExecContext {
    /// Cooperative context on the current runtime.
    pub fn cooperative() -> Result<Self> {
        SchedulerLoop::current().map(ExecContext::Cooperative)
    }

    pub fn is_cooperative(&self) -> bool {
        matches!(self, ExecContext::Cooperative(_))
    }

    pub fn scheduler(&self) -> Option<&SchedulerLoop> {
        match self {
            ExecContext::Cooperative(scheduler) => Some(scheduler),
            ExecContext::Inline => None,
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            ExecContext::Cooperative(_) => "cooperative",
            ExecContext::Inline => "inline",
        }
    }
}

/// Bounded executor for blocking calls.
///
/// Backed by a dedicated current-thread runtime whose blocking pool is capped
/// at `threads`, so calls submitted here serialize onto a predictable set of
/// threads and shut down independently of the caller's scheduler.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Mutex<Option<Runtime>>,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize, thread_name: &str) -> Result<Self> {
        let threads = threads.max(1);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(threads)
            .thread_name(thread_name)
            .build()
            .map_err(Error::Executor)?;

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Submit a blocking call. Fails immediately once the pool is shut down.
    pub fn submit<F, R>(&self, f: F) -> Result<JoinHandle<Result<R>>>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let guard = safe_lock(&self.runtime, "WorkerPool::submit")?;
        let runtime = guard.as_ref().ok_or(Error::ExecutorShutdown)?;
        Ok(runtime.spawn_blocking(f))
    }

    /// Non-blocking shutdown. A call already running finishes on its thread;
    /// queued calls are dropped. Idempotent.
    pub fn shutdown(&self) {
        let runtime = match self.runtime.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            tracing::debug!("shutting down dedicated worker pool");
            runtime.shutdown_background();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        match self.runtime.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl Drop for WorkerPool {
    // Dropping a runtime blocks, which panics inside async code;
    // shutdown_background does not.
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Routes blocking calls according to the caller's [`ExecContext`].
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    executor: Option<Arc<WorkerPool>>,
}

impl Bridge {
    /// Bridge that offloads onto the scheduler's shared blocking pool.
    pub fn shared() -> Self {
        Self { executor: None }
    }

    /// Bridge that offloads onto a dedicated pool.
    pub fn with_executor(executor: Arc<WorkerPool>) -> Self {
        Self {
            executor: Some(executor),
        }
    }

    pub fn executor(&self) -> Option<&Arc<WorkerPool>> {
        self.executor.as_ref()
    }

    /// Run `f` according to `cx` and return its result unchanged.
    ///
    /// A panic inside `f` is resumed on the caller.
    pub async fn run<F, R>(&self, cx: &ExecContext, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        tracing::trace!(
            mode = cx.mode(),
            dedicated = self.executor.is_some(),
            "bridging blocking call"
        );

        match cx {
            ExecContext::Inline => f(),
            ExecContext::Cooperative(scheduler) => {
                let task = match &self.executor {
                    Some(pool) => pool.submit(f)?,
                    None => scheduler.handle().spawn_blocking(f),
                };
                join(task).await
            }
        }
    }
}

async fn join<R>(task: JoinHandle<Result<R>>) -> Result<R> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(Error::Cancelled),
    }
}
