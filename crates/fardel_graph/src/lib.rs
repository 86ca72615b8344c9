//! The asset graph: the bundler's persistent dependency model.
//!
//! This crate defines [`Asset`] and [`Dependency`] with their stable
//! content-derived ids, and the [`AssetGraph`] that tracks assets,
//! dependency requests, and resolution state across builds.

#![warn(missing_docs)]

pub mod asset_graph;
pub mod types;

pub use asset_graph::{AssetGraph, AssetGraphEdge, AssetGraphNode, ResolutionState};
pub use types::{Asset, AssetId, Dependency, DependencyId};
