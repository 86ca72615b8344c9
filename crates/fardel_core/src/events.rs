//! Filesystem and build lifecycle events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fardel_bundle::BundleGraph;
use fardel_graph::AssetId;

/// The kind of a filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsEventKind {
    /// A file appeared.
    Create,
    /// A file's content changed.
    Update,
    /// A file disappeared.
    Delete,
}

/// A single observed filesystem change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEvent {
    /// The affected path.
    pub path: PathBuf,
    /// What happened to it.
    pub kind: FsEventKind,
}

impl FsEvent {
    /// Creates an event of the given kind for a path.
    pub fn new(path: impl Into<PathBuf>, kind: FsEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A build lifecycle event broadcast to reporters and watch subscribers.
#[derive(Clone, Debug)]
pub enum BuildEvent {
    /// A build pass started.
    BuildStart,

    /// A build pass finished successfully.
    BuildSuccess {
        /// The bundle graph produced by this pass, shared read-only.
        bundle_graph: Arc<BundleGraph>,
        /// Assets added, replaced, or removed since the previous pass,
        /// sorted by id.
        changed_assets: Vec<AssetId>,
        /// Wall-clock duration of the pass.
        build_time: Duration,
    },

    /// A build pass failed. In watch mode the previous output stays live.
    BuildFailure {
        /// Rendered description of the failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_event_construction() {
        let event = FsEvent::new("src/index.js", FsEventKind::Update);
        assert_eq!(event.path, PathBuf::from("src/index.js"));
        assert_eq!(event.kind, FsEventKind::Update);
    }

    #[test]
    fn build_events_are_cloneable() {
        let event = BuildEvent::BuildSuccess {
            bundle_graph: Arc::new(BundleGraph::new()),
            changed_assets: Vec::new(),
            build_time: Duration::from_millis(3),
        };
        // Broadcast fans one event out to every subscriber.
        let copy = event.clone();
        assert!(matches!(copy, BuildEvent::BuildSuccess { .. }));
    }
}
