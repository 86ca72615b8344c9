//! The bundler runner and default bundling policy.
//!
//! The runner wraps a pluggable bundling policy and validates its output
//! against the asset graph before anything downstream consumes it. The
//! default policy is intentionally simple: under each entry, synchronous
//! assets are grouped into one bundle per output type, and every async
//! dependency boundary starts a new bundle group.

use std::collections::{HashSet, VecDeque};

use fardel_bundle::{Bundle, BundleGraph, BundleGroup};
use fardel_common::Target;
use fardel_graph::{AssetGraph, AssetId, DependencyId};

use crate::error::BuildError;
use crate::plugin::BundlerPlugin;

/// Runs the bundling policy and validates its output.
pub struct BundlerRunner {
    plugin: Box<dyn BundlerPlugin>,
}

impl BundlerRunner {
    /// Creates a runner around the given policy.
    pub fn new(plugin: Box<dyn BundlerPlugin>) -> Self {
        Self { plugin }
    }

    /// Creates a runner with the default policy.
    pub fn with_default_policy() -> Self {
        Self::new(Box::new(DefaultBundler))
    }

    /// Produces a validated bundle graph for the given targets.
    pub fn run(&self, graph: &AssetGraph, targets: &[Target]) -> Result<BundleGraph, BuildError> {
        let bundle_graph = self.plugin.bundle(graph, targets)?;
        fardel_bundle::validate(&bundle_graph, graph)?;
        Ok(bundle_graph)
    }
}

/// The default bundling policy.
pub struct DefaultBundler;

impl BundlerPlugin for DefaultBundler {
    fn name(&self) -> &'static str {
        "bundler-default"
    }

    fn bundle(&self, graph: &AssetGraph, targets: &[Target]) -> Result<BundleGraph, BuildError> {
        let mut bundle_graph = BundleGraph::new();

        for target in targets {
            let mut used_names: HashSet<String> = HashSet::new();
            let mut queue: VecDeque<DependencyId> =
                graph.entry_dependencies().iter().map(|d| d.id).collect();
            let mut grouped: HashSet<DependencyId> = queue.iter().copied().collect();

            while let Some(group_dep) = queue.pop_front() {
                // An unresolved group entry (failed or excluded) bundles
                // nothing; the builder already reported it.
                let Some(entry_asset_id) = graph.resolved_target(group_dep) else {
                    continue;
                };

                let group_node = bundle_graph.add_group(BundleGroup {
                    entry_dependency_id: group_dep,
                    target: target.clone(),
                });

                // Sync closure of the group entry, bucketed by output type
                // in discovery order. Async edges start new groups.
                let mut buckets: Vec<(String, Vec<AssetId>)> = Vec::new();
                let mut visited = HashSet::new();
                let mut walk = VecDeque::from([entry_asset_id]);
                while let Some(asset_id) = walk.pop_front() {
                    if !visited.insert(asset_id) {
                        continue;
                    }
                    let Some(asset) = graph.asset(asset_id) else {
                        continue;
                    };
                    match buckets.iter_mut().find(|(ty, _)| *ty == asset.asset_type) {
                        Some((_, ids)) => ids.push(asset_id),
                        None => buckets.push((asset.asset_type.clone(), vec![asset_id])),
                    }
                    for dep_id in &asset.dependencies {
                        let Some(dep) = graph.dependency(*dep_id) else {
                            continue;
                        };
                        if dep.is_async {
                            if grouped.insert(*dep_id) {
                                queue.push_back(*dep_id);
                            }
                        } else if let Some(child) = graph.resolved_target(*dep_id) {
                            walk.push_back(child);
                        }
                    }
                }

                let stem = graph
                    .asset(entry_asset_id)
                    .and_then(|a| a.file_path.file_stem())
                    .and_then(|s| s.to_str())
                    .unwrap_or("bundle")
                    .to_string();

                let mut bundle_ids = Vec::new();
                for (bundle_type, asset_ids) in buckets {
                    let bundle_entry = asset_ids[0];
                    let mut name = format!("{stem}.{bundle_type}");
                    if !used_names.insert(name.clone()) {
                        let short = &bundle_entry.to_string()[..8];
                        name = format!("{stem}.{short}.{bundle_type}");
                        used_names.insert(name.clone());
                    }
                    let mut bundle = Bundle::new(bundle_entry, bundle_type, target.clone(), name);
                    bundle.asset_ids = asset_ids;
                    bundle_ids.push(bundle.id);
                    bundle_graph.add_bundle(group_node, bundle);
                }

                // The primary bundle loads its same-group siblings.
                if let Some((first, rest)) = bundle_ids.split_first() {
                    for sibling in rest {
                        bundle_graph.add_reference(*first, *sibling);
                    }
                }
            }
        }

        Ok(bundle_graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fardel_common::{ContentHash, Environment};
    use fardel_graph::{Asset, Dependency};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    fn asset(path: &str, asset_type: &str, code: &str) -> Asset {
        let env = Environment::browser();
        Asset {
            id: AssetId::new(
                Path::new(path),
                ContentHash::from_bytes(code.as_bytes()),
                ContentHash::from_bytes(b"config"),
                env.hash(),
            ),
            file_path: PathBuf::from(path),
            asset_type: asset_type.to_string(),
            code: code.to_string(),
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

    /// index.js importing a.css, plus a dynamic import of lazy.js.
    fn mixed_graph() -> AssetGraph {
        let env = Environment::browser();
        let mut graph = AssetGraph::new();
        graph.set_entries(&[PathBuf::from("index.js")], &env);
        let entry_dep = graph.entry_dependencies().pop().unwrap();

        let mut index = asset("index.js", "js", "import './a.css';");
        let css_dep = Dependency::new("./a.css", Path::new("index.js"), env.clone());
        let lazy_dep =
            Dependency::new("./lazy.js", Path::new("index.js"), env.clone()).with_async();
        index.dependencies = vec![css_dep.id, lazy_dep.id];
        let index_id = index.id;

        let css = asset("a.css", "css", "body {}");
        let css_id = css.id;
        let lazy = asset("lazy.js", "js", "const l = 1;");
        let lazy_id = lazy.id;

        graph.upsert_asset(index);
        graph.upsert_asset(css);
        graph.upsert_asset(lazy);
        graph.mark_resolved(entry_dep.id, index_id);
        let index_node = graph.asset_node(index_id).unwrap();
        graph.add_dependency(index_node, css_dep.clone());
        graph.add_dependency(index_node, lazy_dep.clone());
        graph.mark_resolved(css_dep.id, css_id);
        graph.mark_resolved(lazy_dep.id, lazy_id);
        graph
    }

    #[test]
    fn splits_types_into_sibling_bundles() {
        let graph = mixed_graph();
        let runner = BundlerRunner::with_default_policy();
        let bundles = runner.run(&graph, &[target()]).unwrap();

        // Entry group: index.js + index.css. Async group: lazy.js.
        assert_eq!(bundles.groups().len(), 2);
        let names: Vec<String> = bundles.bundles().iter().map(|b| b.name.clone()).collect();
        assert!(names.contains(&"index.js".to_string()));
        assert!(names.contains(&"index.css".to_string()));
        assert!(names.contains(&"lazy.js".to_string()));
    }

    #[test]
    fn js_bundle_references_its_css_sibling() {
        let graph = mixed_graph();
        let bundles = BundlerRunner::with_default_policy()
            .run(&graph, &[target()])
            .unwrap();

        let js = bundles
            .bundles()
            .into_iter()
            .find(|b| b.name == "index.js")
            .unwrap()
            .clone();
        let css = bundles
            .bundles()
            .into_iter()
            .find(|b| b.name == "index.css")
            .unwrap()
            .clone();
        assert_eq!(bundles.references(js.id), vec![css.id]);
    }

    #[test]
    fn policy_is_deterministic() {
        let graph = mixed_graph();
        let runner = BundlerRunner::with_default_policy();
        let a = runner.run(&graph, &[target()]).unwrap();
        let b = runner.run(&graph, &[target()]).unwrap();
        let ids = |g: &BundleGraph| g.bundles().iter().map(|b| b.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn every_target_gets_its_own_bundles() {
        let graph = mixed_graph();
        let targets = [target(), Target::new("modern", "dist/modern")];
        let bundles = BundlerRunner::with_default_policy()
            .run(&graph, &targets)
            .unwrap();
        assert_eq!(bundles.groups().len(), 4);
    }

    #[test]
    fn colliding_entry_names_are_disambiguated() {
        let env = Environment::browser();
        let mut graph = AssetGraph::new();
        graph.set_entries(
            &[PathBuf::from("a/index.js"), PathBuf::from("b/index.js")],
            &env,
        );
        let deps = graph.entry_dependencies();

        let first = asset("a/index.js", "js", "const a = 1;");
        let second = asset("b/index.js", "js", "const b = 2;");
        let (first_id, second_id) = (first.id, second.id);
        graph.upsert_asset(first);
        graph.upsert_asset(second);
        graph.mark_resolved(deps[0].id, first_id);
        graph.mark_resolved(deps[1].id, second_id);

        let bundles = BundlerRunner::with_default_policy()
            .run(&graph, &[target()])
            .unwrap();
        let names: HashSet<String> = bundles
            .bundles()
            .iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(names.len(), 2, "names must not collide: {names:?}");
    }
}
