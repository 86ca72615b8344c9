//! The per-build bundle graph.
//!
//! Produced fresh by the bundling policy each build and read-only to
//! everything downstream. Nodes are the root, bundle groups, and bundles;
//! edges run root→group, group→bundle, and bundle→bundle for references
//! between bundles (which may be mutual, so traversals are visited-set
//! based).

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use crate::types::{Bundle, BundleGroup, BundleId, Stats};

/// A node in the bundle graph.
#[derive(Clone, Debug)]
pub enum BundleGraphNode {
    /// The traversal root.
    Root,
    /// A bundle group.
    Group(BundleGroup),
    /// A bundle.
    Bundle(Bundle),
}

/// The DAG grouping assets into output bundles for one build.
#[derive(Clone, Debug)]
pub struct BundleGraph {
    graph: StableDiGraph<BundleGraphNode, ()>,
    root: NodeIndex,
    bundle_index: HashMap<BundleId, NodeIndex>,
    bundle_order: Vec<BundleId>,
}

impl Default for BundleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleGraph {
    /// Creates an empty bundle graph.
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(BundleGraphNode::Root);
        Self {
            graph,
            root,
            bundle_index: HashMap::new(),
            bundle_order: Vec::new(),
        }
    }

    /// Adds a bundle group under the root.
    pub fn add_group(&mut self, group: BundleGroup) -> NodeIndex {
        let node = self.graph.add_node(BundleGraphNode::Group(group));
        self.graph.add_edge(self.root, node, ());
        node
    }

    /// Adds a bundle under a group. Deduplicates by bundle id: adding a
    /// bundle that already exists links the existing node into the group.
    pub fn add_bundle(&mut self, group: NodeIndex, bundle: Bundle) -> NodeIndex {
        let id = bundle.id;
        let node = match self.bundle_index.get(&id) {
            Some(&node) => node,
            None => {
                let node = self.graph.add_node(BundleGraphNode::Bundle(bundle));
                self.bundle_index.insert(id, node);
                self.bundle_order.push(id);
                node
            }
        };
        if !self.graph.contains_edge(group, node) {
            self.graph.add_edge(group, node, ());
        }
        node
    }

    /// Records that one bundle references another (e.g. a JS bundle loading
    /// its sibling CSS bundle). Mutual references are legal.
    pub fn add_reference(&mut self, from: BundleId, to: BundleId) {
        let (Some(&from_node), Some(&to_node)) =
            (self.bundle_index.get(&from), self.bundle_index.get(&to))
        else {
            return;
        };
        if !self.graph.contains_edge(from_node, to_node) {
            self.graph.add_edge(from_node, to_node, ());
        }
    }

    /// Returns the bundles a bundle references directly.
    pub fn references(&self, id: BundleId) -> Vec<BundleId> {
        let Some(&node) = self.bundle_index.get(&id) else {
            return Vec::new();
        };
        let mut refs: Vec<BundleId> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .filter_map(|n| match self.graph.node_weight(n) {
                Some(BundleGraphNode::Bundle(bundle)) => Some(bundle.id),
                _ => None,
            })
            .collect();
        refs.sort();
        refs
    }

    /// Looks up a bundle by id.
    pub fn bundle(&self, id: BundleId) -> Option<&Bundle> {
        let node = *self.bundle_index.get(&id)?;
        match self.graph.node_weight(node)? {
            BundleGraphNode::Bundle(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// All bundles in insertion order (deterministic for a deterministic
    /// policy).
    pub fn bundles(&self) -> Vec<&Bundle> {
        self.bundle_order
            .iter()
            .filter_map(|id| self.bundle(*id))
            .collect()
    }

    /// All bundle groups under the root.
    pub fn groups(&self) -> Vec<&BundleGroup> {
        self.graph
            .neighbors_directed(self.root, Direction::Outgoing)
            .filter_map(|n| match self.graph.node_weight(n) {
                Some(BundleGraphNode::Group(group)) => Some(group),
                _ => None,
            })
            .collect()
    }

    /// The bundles belonging to a group node.
    pub fn bundles_in_group(&self, group: NodeIndex) -> Vec<&Bundle> {
        self.graph
            .neighbors_directed(group, Direction::Outgoing)
            .filter_map(|n| match self.graph.node_weight(n) {
                Some(BundleGraphNode::Bundle(bundle)) => Some(bundle),
                _ => None,
            })
            .collect()
    }

    /// Looks up the group stored at a group node.
    pub fn group(&self, node: NodeIndex) -> Option<&BundleGroup> {
        match self.graph.node_weight(node)? {
            BundleGraphNode::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Group node indices under the root.
    pub fn group_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(self.root, Direction::Outgoing)
            .filter(|n| matches!(self.graph.node_weight(*n), Some(BundleGraphNode::Group(_))))
            .collect()
    }

    /// Attaches packaging stats to a bundle.
    pub fn set_stats(&mut self, id: BundleId, stats: Stats) {
        if let Some(&node) = self.bundle_index.get(&id) {
            if let Some(BundleGraphNode::Bundle(bundle)) = self.graph.node_weight_mut(node) {
                bundle.stats = Some(stats);
            }
        }
    }

    /// Number of bundles in the graph.
    pub fn bundle_count(&self) -> usize {
        self.bundle_index.len()
    }

    /// Every bundle reachable from a starting bundle, following reference
    /// edges. Cycle-safe via a visited set.
    pub fn reachable_bundles(&self, from: BundleId) -> Vec<BundleId> {
        let Some(&start) = self.bundle_index.get(&from) else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if let Some(BundleGraphNode::Bundle(bundle)) = self.graph.node_weight(node) {
                out.push(bundle.id);
            }
            for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
                stack.push(neighbor);
            }
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fardel_common::{ContentHash, Environment, Target};
    use fardel_graph::{AssetId, Dependency};
    use std::path::Path;

    fn asset_id(path: &str) -> AssetId {
        AssetId::new(
            Path::new(path),
            ContentHash::from_bytes(b"content"),
            ContentHash::from_bytes(b"config"),
            Environment::browser().hash(),
        )
    }

    fn target() -> Target {
        Target::new("default", "dist")
    }

    fn group() -> BundleGroup {
        BundleGroup {
            entry_dependency_id: Dependency::entry("index.js", Environment::browser()).id,
            target: target(),
        }
    }

    #[test]
    fn add_group_and_bundles() {
        let mut graph = BundleGraph::new();
        let g = graph.add_group(group());
        let js = Bundle::new(asset_id("index.js"), "js", target(), "index.js");
        let css = Bundle::new(asset_id("index.js"), "css", target(), "index.css");
        graph.add_bundle(g, js.clone());
        graph.add_bundle(g, css.clone());

        assert_eq!(graph.bundle_count(), 2);
        assert_eq!(graph.groups().len(), 1);
        assert_eq!(graph.bundles_in_group(g).len(), 2);
        assert!(graph.bundle(js.id).is_some());
    }

    #[test]
    fn debug_formatting_names_the_nodes() {
        let mut graph = BundleGraph::new();
        let g = graph.add_group(group());
        graph.add_bundle(g, Bundle::new(asset_id("index.js"), "js", target(), "index.js"));

        // Build events carry the graph in Debug-formatted failure output.
        let rendered = format!("{graph:?}");
        assert!(rendered.contains("Root"));
        assert!(rendered.contains("index.js"));
    }

    #[test]
    fn add_bundle_dedupes_by_id() {
        let mut graph = BundleGraph::new();
        let g1 = graph.add_group(group());
        let g2 = graph.add_group(group());
        let bundle = Bundle::new(asset_id("shared.js"), "js", target(), "shared.js");
        graph.add_bundle(g1, bundle.clone());
        graph.add_bundle(g2, bundle);
        assert_eq!(graph.bundle_count(), 1);
    }

    #[test]
    fn mutual_references_are_cycle_safe() {
        let mut graph = BundleGraph::new();
        let g = graph.add_group(group());
        let a = Bundle::new(asset_id("a.js"), "js", target(), "a.js");
        let b = Bundle::new(asset_id("b.js"), "js", target(), "b.js");
        let (a_id, b_id) = (a.id, b.id);
        graph.add_bundle(g, a);
        graph.add_bundle(g, b);
        graph.add_reference(a_id, b_id);
        graph.add_reference(b_id, a_id);

        assert_eq!(graph.references(a_id), vec![b_id]);
        assert_eq!(graph.references(b_id), vec![a_id]);
        let mut expected = vec![a_id, b_id];
        expected.sort();
        assert_eq!(graph.reachable_bundles(a_id), expected);
    }

    #[test]
    fn set_stats_after_packaging() {
        let mut graph = BundleGraph::new();
        let g = graph.add_group(group());
        let bundle = Bundle::new(asset_id("index.js"), "js", target(), "index.js");
        let id = bundle.id;
        graph.add_bundle(g, bundle);

        graph.set_stats(id, Stats { size: 1024, time_ms: 5 });
        assert_eq!(
            graph.bundle(id).unwrap().stats,
            Some(Stats { size: 1024, time_ms: 5 })
        );
    }

    #[test]
    fn bundles_keep_insertion_order() {
        let mut graph = BundleGraph::new();
        let g = graph.add_group(group());
        let first = Bundle::new(asset_id("z.js"), "js", target(), "z.js");
        let second = Bundle::new(asset_id("a.js"), "js", target(), "a.js");
        let order = vec![first.id, second.id];
        graph.add_bundle(g, first);
        graph.add_bundle(g, second);
        assert_eq!(
            graph.bundles().iter().map(|b| b.id).collect::<Vec<_>>(),
            order
        );
    }
}
