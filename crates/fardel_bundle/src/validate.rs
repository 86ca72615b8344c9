//! Structural validation of a bundling policy's output.
//!
//! The bundling policy is pluggable, so its output is checked before
//! anything downstream consumes it: every asset must land in at least one
//! bundle, every bundle may only name assets that exist, and every group
//! must contain at least one bundle and be rooted at a known entry
//! dependency.

use std::collections::HashSet;
use std::path::PathBuf;

use fardel_graph::AssetGraph;

use crate::bundle_graph::BundleGraph;

/// Structural invariant violations in a bundle graph.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// An asset in the asset graph is missing from every bundle.
    #[error("asset {path} is not assigned to any bundle")]
    UnbundledAsset {
        /// The asset's source file.
        path: PathBuf,
    },

    /// A bundle names an asset that does not exist in the asset graph.
    #[error("bundle '{bundle}' references unknown asset {asset_id}")]
    UnknownAsset {
        /// The bundle's output name.
        bundle: String,
        /// The unknown asset id, rendered as hex.
        asset_id: String,
    },

    /// A bundle group contains no bundles.
    #[error("bundle group for dependency {dependency_id} contains no bundles")]
    EmptyGroup {
        /// The group's entry dependency id, rendered as hex.
        dependency_id: String,
    },

    /// A bundle group's entry dependency is not in the asset graph.
    #[error("bundle group references unknown dependency {dependency_id}")]
    UnknownEntryDependency {
        /// The unknown dependency id, rendered as hex.
        dependency_id: String,
    },
}

/// Validates a bundle graph against the asset graph it was derived from.
pub fn validate(bundle_graph: &BundleGraph, asset_graph: &AssetGraph) -> Result<(), BundleError> {
    let mut bundled = HashSet::new();

    for bundle in bundle_graph.bundles() {
        for asset_id in &bundle.asset_ids {
            if asset_graph.asset(*asset_id).is_none() {
                return Err(BundleError::UnknownAsset {
                    bundle: bundle.name.clone(),
                    asset_id: asset_id.to_string(),
                });
            }
            bundled.insert(*asset_id);
        }
    }

    for asset in asset_graph.assets() {
        if !bundled.contains(&asset.id) {
            return Err(BundleError::UnbundledAsset {
                path: asset.file_path.clone(),
            });
        }
    }

    for group_node in bundle_graph.group_nodes() {
        let Some(group) = bundle_graph.group(group_node) else {
            continue;
        };
        if bundle_graph.bundles_in_group(group_node).is_empty() {
            return Err(BundleError::EmptyGroup {
                dependency_id: group.entry_dependency_id.to_string(),
            });
        }
        if asset_graph.dependency(group.entry_dependency_id).is_none() {
            return Err(BundleError::UnknownEntryDependency {
                dependency_id: group.entry_dependency_id.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bundle, BundleGroup};
    use fardel_common::{Environment, Target};
    use fardel_graph::{Asset, AssetId, Dependency};
    use fardel_common::ContentHash;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    fn make_asset(path: &str) -> Asset {
        let env = Environment::browser();
        Asset {
            id: AssetId::new(
                Path::new(path),
                ContentHash::from_bytes(path.as_bytes()),
                ContentHash::from_bytes(b"config"),
                env.hash(),
            ),
            file_path: PathBuf::from(path),
            asset_type: "js".to_string(),
            code: String::new(),
            source_map: None,
            dependencies: Vec::new(),
            meta: BTreeMap::new(),
            env,
            is_source: true,
        }
    }

    fn target() -> Target {
        Target::new("default", "dist")
    }

    /// Asset graph with one resolved entry asset; returns the graph, the
    /// entry dependency, and the asset.
    fn resolved_graph() -> (AssetGraph, Dependency, Asset) {
        let mut graph = AssetGraph::new();
        graph.set_entries(&[PathBuf::from("index.js")], &Environment::browser());
        let dep = graph.entry_dependencies().pop().unwrap();
        let asset = make_asset("index.js");
        graph.upsert_asset(asset.clone());
        graph.mark_resolved(dep.id, asset.id);
        (graph, dep, asset)
    }

    #[test]
    fn valid_graph_passes() {
        let (asset_graph, dep, asset) = resolved_graph();
        let mut bundle_graph = BundleGraph::new();
        let g = bundle_graph.add_group(BundleGroup {
            entry_dependency_id: dep.id,
            target: target(),
        });
        bundle_graph.add_bundle(g, Bundle::new(asset.id, "js", target(), "index.js"));

        assert!(validate(&bundle_graph, &asset_graph).is_ok());
    }

    #[test]
    fn unbundled_asset_rejected() {
        let (asset_graph, dep, _asset) = resolved_graph();
        let mut bundle_graph = BundleGraph::new();
        let g = bundle_graph.add_group(BundleGroup {
            entry_dependency_id: dep.id,
            target: target(),
        });
        // Bundle an unrelated asset; the entry asset is left out. The
        // unrelated asset is unknown to the asset graph, which is caught
        // first.
        let stray = make_asset("stray.js");
        bundle_graph.add_bundle(g, Bundle::new(stray.id, "js", target(), "stray.js"));

        assert!(matches!(
            validate(&bundle_graph, &asset_graph),
            Err(BundleError::UnknownAsset { .. })
        ));
    }

    #[test]
    fn missing_asset_coverage_rejected() {
        let (asset_graph, dep, _asset) = resolved_graph();
        let bundle_graph = {
            let mut bg = BundleGraph::new();
            bg.add_group(BundleGroup {
                entry_dependency_id: dep.id,
                target: target(),
            });
            bg
        };
        // No bundles at all: the entry asset is unbundled. The empty group
        // would also fail, but asset coverage is checked first.
        assert!(matches!(
            validate(&bundle_graph, &asset_graph),
            Err(BundleError::UnbundledAsset { .. })
        ));
    }

    #[test]
    fn empty_group_rejected() {
        let (asset_graph, dep, asset) = resolved_graph();
        // A valid group covering the entry asset, plus an empty group.
        let mut bundle_graph = BundleGraph::new();
        let g = bundle_graph.add_group(BundleGroup {
            entry_dependency_id: dep.id,
            target: target(),
        });
        bundle_graph.add_bundle(g, Bundle::new(asset.id, "js", target(), "index.js"));
        bundle_graph.add_group(BundleGroup {
            entry_dependency_id: dep.id,
            target: target(),
        });

        assert!(matches!(
            validate(&bundle_graph, &asset_graph),
            Err(BundleError::EmptyGroup { .. })
        ));
    }

    #[test]
    fn unknown_entry_dependency_rejected() {
        let (asset_graph, _dep, asset) = resolved_graph();
        let foreign = Dependency::entry("other.js", Environment::browser());
        let mut bundle_graph = BundleGraph::new();
        let g = bundle_graph.add_group(BundleGroup {
            entry_dependency_id: foreign.id,
            target: target(),
        });
        bundle_graph.add_bundle(g, Bundle::new(asset.id, "js", target(), "index.js"));

        assert!(matches!(
            validate(&bundle_graph, &asset_graph),
            Err(BundleError::UnknownEntryDependency { .. })
        ));
    }
}
