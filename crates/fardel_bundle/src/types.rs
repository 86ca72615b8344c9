//! Bundle and bundle group types.

use fardel_common::{ContentHash, Target};
use fardel_graph::{AssetId, DependencyId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stable identity of a bundle.
///
/// Derived from the entry asset, the bundle type, and the target name, so
/// bundle identity is deterministic across builds of the same tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BundleId(ContentHash);

impl BundleId {
    /// Derives a bundle id from its identity inputs.
    pub fn new(entry_asset: AssetId, bundle_type: &str, target_name: &str) -> Self {
        let type_hash = ContentHash::from_bytes(bundle_type.as_bytes());
        let target_hash = ContentHash::from_bytes(target_name.as_bytes());
        Self(ContentHash::combine(&[
            entry_asset.hash(),
            type_hash,
            target_hash,
        ]))
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BundleId({})", self.0)
    }
}

/// Output statistics attached to a bundle after packaging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Packaged size in bytes.
    pub size: u64,
    /// Time spent packaging, in milliseconds.
    pub time_ms: u64,
}

/// A set of assets serialized together into one output file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Stable identity.
    pub id: BundleId,
    /// Output type tag, e.g. `"js"` or `"css"`.
    pub bundle_type: String,
    /// The target this bundle is written to.
    pub target: Target,
    /// The asset execution starts from.
    pub entry_asset_id: AssetId,
    /// All assets in the bundle, in deterministic traversal order.
    pub asset_ids: Vec<AssetId>,
    /// Output file name within the target's dist directory.
    pub name: String,
    /// Computed after packaging; `None` until then.
    pub stats: Option<Stats>,
}

impl Bundle {
    /// Creates a bundle rooted at the given entry asset.
    pub fn new(
        entry_asset_id: AssetId,
        bundle_type: impl Into<String>,
        target: Target,
        name: impl Into<String>,
    ) -> Self {
        let bundle_type = bundle_type.into();
        Self {
            id: BundleId::new(entry_asset_id, &bundle_type, &target.name),
            bundle_type,
            target,
            entry_asset_id,
            asset_ids: vec![entry_asset_id],
            name: name.into(),
            stats: None,
        }
    }
}

/// Roots the bundles reachable from one entry dependency.
///
/// A synchronous entry produces the initial group; each async dependency
/// boundary starts a new one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleGroup {
    /// The single dependency this group is entered through.
    pub entry_dependency_id: DependencyId,
    /// The target the group's bundles belong to.
    pub target: Target,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fardel_common::Environment;
    use std::path::Path;

    fn asset_id(path: &str) -> AssetId {
        AssetId::new(
            Path::new(path),
            ContentHash::from_bytes(b"content"),
            ContentHash::from_bytes(b"config"),
            Environment::browser().hash(),
        )
    }

    #[test]
    fn bundle_id_deterministic() {
        let entry = asset_id("index.js");
        assert_eq!(
            BundleId::new(entry, "js", "default"),
            BundleId::new(entry, "js", "default")
        );
    }

    #[test]
    fn bundle_id_varies_by_type_and_target() {
        let entry = asset_id("index.js");
        let base = BundleId::new(entry, "js", "default");
        assert_ne!(base, BundleId::new(entry, "css", "default"));
        assert_ne!(base, BundleId::new(entry, "js", "modern"));
    }

    #[test]
    fn new_bundle_contains_its_entry() {
        let entry = asset_id("index.js");
        let bundle = Bundle::new(entry, "js", Target::new("default", "dist"), "index.js");
        assert_eq!(bundle.asset_ids, vec![entry]);
        assert!(bundle.stats.is_none());
    }
}
