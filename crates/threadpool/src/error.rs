//! Error types for thread pool operations

use thiserror::Error;

/// Result type for thread pool operations
pub type Result<T> = std::result::Result<T, TaskPoolError>;

/// Thread pool operation errors
///
/// `AlreadyActive` and `QueueFull` are reported to the caller and never
/// fatal to the pool; `InitFailed` means the pool was never usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskPoolError {
    /// The task is already queued or executing
    #[error("task #{id} is already active")]
    AlreadyActive {
        /// Id the task carried when the duplicate submission was made
        id: u64,
    },

    /// Backpressure: the pending queue is at its configured limit
    #[error("thread pool {name:?} queue overflow: {waiting} tasks waiting")]
    QueueFull {
        /// Pool name
        name: String,
        /// Tasks enqueued but not yet claimed by a worker
        waiting: usize,
    },

    /// Pool construction failed; the pool is unusable
    #[error("thread pool {name:?} init failed: {reason}")]
    InitFailed {
        /// Pool name
        name: String,
        /// What went wrong
        reason: String,
    },
}
