//! Worker pool for parallel transform and package jobs.
//!
//! Jobs cross into workers as serialized bytes and come back the same way,
//! keeping the execution boundary free of shared-memory references. Workers
//! are isolated: a crashing job is caught, the worker's context is rebuilt,
//! and the job is retried once before a typed error reaches the caller.

#![warn(missing_docs)]

pub mod error;
pub mod job;
pub mod pool;

pub use error::WorkerError;
pub use job::{decode, encode, JobFailure};
pub use pool::{JobHandler, WorkerInit, WorkerPool};
