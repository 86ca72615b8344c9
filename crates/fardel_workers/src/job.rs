//! Job payload serialization.
//!
//! Jobs cross the worker boundary as serialized bytes only; no shared-memory
//! references are allowed in either direction. The helpers here wrap
//! `bincode` so every payload uses the same configuration.

use crate::error::WorkerError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A structured failure produced inside a worker.
///
/// Jobs that fail in an expected way (a transformer rejecting its input, a
/// packager hitting a bad bundle) return one of these rather than crashing
/// the worker. The kind tag lets the caller map the failure back into its
/// own error taxonomy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobFailure {
    /// Failure kind tag, e.g. `"transform"`, `"resolve"`, `"package"`.
    pub kind: String,
    /// Human-readable failure description.
    pub message: String,
}

impl JobFailure {
    /// Creates a failure with the given kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<JobFailure> for WorkerError {
    fn from(failure: JobFailure) -> Self {
        WorkerError::Job {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// Serializes a job payload or result to bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, WorkerError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| WorkerError::Serialization(e.to_string()))
}

/// Deserializes a job payload or result from bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WorkerError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| WorkerError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        values: Vec<u32>,
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = Payload {
            name: "transform".to_string(),
            values: vec![1, 2, 3],
        };
        let bytes = encode(&payload).unwrap();
        let back: Payload = decode(&bytes).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn decode_garbage_fails() {
        let result: Result<Payload, _> = decode(&[0xff, 0x01]);
        assert!(matches!(result, Err(WorkerError::Serialization(_))));
    }

    #[test]
    fn failure_converts_to_worker_error() {
        let failure = JobFailure::new("transform", "bad input");
        let err: WorkerError = failure.into();
        assert!(matches!(
            err,
            WorkerError::Job { kind, message } if kind == "transform" && message == "bad input"
        ));
    }
}
