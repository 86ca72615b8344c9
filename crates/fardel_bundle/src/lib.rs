//! Bundle model: groups of assets shaped for output.
//!
//! A build produces a [`BundleGraph`] from the asset graph: one
//! [`BundleGroup`] per entry (and per async boundary), each holding the
//! [`Bundle`]s that will be packaged into output files. Cross-type
//! references (a JS bundle pulling in a CSS bundle) are explicit edges.

#![warn(missing_docs)]

pub mod bundle_graph;
pub mod types;
pub mod validate;

pub use bundle_graph::{BundleGraph, BundleGraphNode};
pub use types::{Bundle, BundleGroup, BundleId, Stats};
pub use validate::{validate, BundleError};
