//! Node properties notify - asynchronous, ordered observer delivery
//!
//! Provides the delivery side of the node properties state service:
//! - `WorkerPool`: an explicitly started/stopped execution context that
//!   runs callback tasks off the producer's thread
//! - `OrderedCallbackManager`: fan-out of callbacks to every registered
//!   listener, strictly sequential and FIFO per listener, with failing
//!   listeners logged and cancelled

pub mod callback;
pub mod pool;

pub use callback::{
    async_callback, AsyncCallback, CallbackExceptionPolicy, OrderedCallbackManager, Registration,
};
pub use pool::{Task, TaskExecutor, WorkerPool, WorkerPoolConfig};

use thiserror::Error;

/// Errors originating from the notification layer.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Worker pool is stopped")]
    PoolStopped,

    #[error("Invalid worker pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
