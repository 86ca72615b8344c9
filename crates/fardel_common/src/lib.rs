//! Shared foundational types used across the fardel bundler.
//!
//! This crate provides content hashing, target environment descriptors,
//! and output target definitions shared by the graph, cache, worker, and
//! orchestration crates.

#![warn(missing_docs)]

pub mod env;
pub mod hash;
pub mod target;

pub use env::{EnvContext, Environment};
pub use hash::ContentHash;
pub use target::Target;
