//! Content-addressed caching for incremental builds.
//!
//! This crate provides a write-once blob store keyed by content-derived
//! hashes, enabling transform and package work to be skipped across builds
//! and process restarts when the inputs are unchanged.

#![warn(missing_docs)]

pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use store::ContentCache;

/// Cache kind for transform job outputs.
pub const KIND_TRANSFORM: &str = "transform";

/// Cache kind for packaged bundle bytes.
pub const KIND_PACKAGE: &str = "package";
