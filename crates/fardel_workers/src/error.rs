//! Error types for worker pool operations.

/// Errors surfaced to callers of [`WorkerPool::invoke`](crate::WorkerPool::invoke).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The job ran and returned a structured failure.
    #[error("{kind}: {message}")]
    Job {
        /// Failure kind tag, e.g. `"transform"` or `"package"`.
        kind: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The worker executing the job crashed, and the retry crashed too.
    #[error("worker crashed while executing a job (after retry)")]
    Crashed,

    /// The pool is shutting down and no longer accepts jobs.
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// A job payload or result could not be serialized.
    #[error("job serialization error: {0}")]
    Serialization(String),
}
