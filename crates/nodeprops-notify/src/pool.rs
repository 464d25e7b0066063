//! Worker pool that runs callback tasks off the caller's thread.
//!
//! The pool is owned by whoever assembles the service and has an explicit
//! lifecycle: `start` builds a dedicated tokio runtime, `from_handle`
//! borrows a runtime the caller already runs, and `stop` refuses further
//! work. Tasks are plain blocking closures and run on the runtime's
//! blocking thread pool, so one slow task never stalls the async workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

use nodeprops_protocol::{
    DEFAULT_NOTIFY_MAX_CALLBACK_THREADS, DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_NOTIFY_THREAD_NAME,
};

use crate::NotifyError;

/// A unit of work submitted to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Submit-a-unit-of-work capability.
///
/// Implementations give no ordering guarantee between tasks.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Task) -> Result<(), NotifyError>;
}

/// Configuration for a [`WorkerPool`] that owns its runtime.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Upper bound on threads concurrently running tasks.
    pub max_callback_threads: usize,
    /// Grace period for running tasks when the pool is stopped.
    pub shutdown_timeout: Duration,
    /// Thread name prefix.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_callback_threads: DEFAULT_NOTIFY_MAX_CALLBACK_THREADS,
            shutdown_timeout: Duration::from_millis(DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS),
            thread_name: DEFAULT_NOTIFY_THREAD_NAME.to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.max_callback_threads == 0 {
            return Err(NotifyError::InvalidConfig(
                "max_callback_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Tokio-backed [`TaskExecutor`].
pub struct WorkerPool {
    handle: Handle,
    /// Present only when the pool owns its runtime and has not been stopped.
    runtime: Mutex<Option<Runtime>>,
    shutdown_timeout: Duration,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// Build and start a dedicated runtime.
    pub fn start(config: WorkerPoolConfig) -> Result<Self, NotifyError> {
        config.validate()?;
        let runtime = Builder::new_multi_thread()
            // Tasks only ever run on the blocking pool.
            .worker_threads(1)
            .max_blocking_threads(config.max_callback_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;
        tracing::info!(
            max_callback_threads = config.max_callback_threads,
            "Notification worker pool started"
        );
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shutdown_timeout: config.shutdown_timeout,
            stopped: AtomicBool::new(false),
        })
    }

    /// Run tasks on a runtime owned by the caller. `stop` only refuses new
    /// work; the runtime itself is left alone.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: Mutex::new(None),
            shutdown_timeout: Duration::ZERO,
            stopped: AtomicBool::new(false),
        }
    }

    /// Stop accepting tasks and shut down an owned runtime, waiting up to
    /// the configured timeout for running tasks.
    ///
    /// Must not be called from within an async context of the owned runtime.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_timeout(self.shutdown_timeout);
        }
        tracing::info!("Notification worker pool stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for WorkerPool {
    fn execute(&self, task: Task) -> Result<(), NotifyError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(NotifyError::PoolStopped);
        }
        // Dropping the JoinHandle detaches the task.
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("owns_runtime", &self.runtime.lock().is_some())
            .field("running", &self.is_running())
            .finish()
    }
}
