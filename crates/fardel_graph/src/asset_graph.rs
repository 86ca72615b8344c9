//! The persistent asset graph.
//!
//! Nodes are tagged variants (root, entry, dependency, asset) and edges
//! encode "declares" and "resolves to" relations. The graph lives across
//! builds: a build pass mutates it through the operations here, and
//! everything downstream sees read-only snapshots. Circular module
//! dependencies are legal, so every traversal tracks visited nodes instead
//! of assuming acyclicity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use fardel_common::Environment;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::types::{Asset, AssetId, Dependency, DependencyId};

/// The resolution state of a dependency node.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionState {
    /// Not yet resolved; on the build worklist.
    Pending,
    /// Resolved to an asset.
    Resolved(AssetId),
    /// Deliberately not part of the graph (external or dropped optional).
    Excluded,
    /// Resolution failed; re-checked whenever a file is created.
    Failed,
}

/// A node in the asset graph.
#[derive(Clone, Debug)]
pub enum AssetGraphNode {
    /// The single root all traversals start from.
    Root,
    /// An entry point file.
    Entry(PathBuf),
    /// A dependency request and its resolution state.
    Dependency {
        /// The dependency.
        dependency: Dependency,
        /// Current resolution state.
        state: ResolutionState,
    },
    /// A transformed asset and its validity.
    Asset {
        /// The asset.
        asset: Asset,
        /// `false` when the source file changed and a re-transform is due.
        valid: bool,
    },
}

/// An edge in the asset graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetGraphEdge {
    /// Parent declares the child (root→entry, entry→dependency,
    /// asset→dependency).
    Child,
    /// A dependency resolves to an asset.
    ResolvesTo,
}

/// The mutable, persistent graph of assets and dependencies.
///
/// Owned exclusively by the asset graph builder; mutated only during a
/// build pass. All lookups are keyed by stable content-derived ids, which
/// makes the final structure independent of job completion order.
#[derive(Clone)]
pub struct AssetGraph {
    graph: StableDiGraph<AssetGraphNode, AssetGraphEdge>,
    root: NodeIndex,
    entry_order: Vec<DependencyId>,
    entry_index: HashMap<PathBuf, NodeIndex>,
    dep_index: HashMap<DependencyId, NodeIndex>,
    asset_index: HashMap<AssetId, NodeIndex>,
    path_index: HashMap<PathBuf, Vec<NodeIndex>>,
}

impl Default for AssetGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetGraph {
    /// Creates an empty graph containing only the root node.
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(AssetGraphNode::Root);
        Self {
            graph,
            root,
            entry_order: Vec::new(),
            entry_index: HashMap::new(),
            dep_index: HashMap::new(),
            asset_index: HashMap::new(),
            path_index: HashMap::new(),
        }
    }

    /// Registers entry points, creating an entry node and a pending entry
    /// dependency for each. Idempotent for already-known entries.
    pub fn set_entries(&mut self, entries: &[PathBuf], env: &Environment) {
        for entry in entries {
            if self.entry_index.contains_key(entry) {
                continue;
            }
            let entry_node = self.graph.add_node(AssetGraphNode::Entry(entry.clone()));
            self.graph
                .add_edge(self.root, entry_node, AssetGraphEdge::Child);
            self.entry_index.insert(entry.clone(), entry_node);

            let dep = Dependency::entry(entry.to_string_lossy(), env.clone());
            let dep_id = dep.id;
            self.add_dependency(entry_node, dep);
            self.entry_order.push(dep_id);
        }
    }

    /// Adds a dependency as a child of `parent`, deduplicating by id.
    ///
    /// Returns the dependency's node index. A re-discovered dependency keeps
    /// its resolution state; only the missing child edge is added.
    pub fn add_dependency(&mut self, parent: NodeIndex, dependency: Dependency) -> NodeIndex {
        let id = dependency.id;
        let node = match self.dep_index.get(&id) {
            Some(&node) => node,
            None => {
                let node = self.graph.add_node(AssetGraphNode::Dependency {
                    dependency,
                    state: ResolutionState::Pending,
                });
                self.dep_index.insert(id, node);
                node
            }
        };
        if !self.graph.contains_edge(parent, node) {
            self.graph.add_edge(parent, node, AssetGraphEdge::Child);
        }
        node
    }

    /// Returns all pending dependencies, sorted by id for deterministic
    /// worklist ordering.
    pub fn pending_dependencies(&self) -> Vec<Dependency> {
        let mut pending: Vec<Dependency> = self
            .graph
            .node_weights()
            .filter_map(|node| match node {
                AssetGraphNode::Dependency {
                    dependency,
                    state: ResolutionState::Pending,
                } => Some(dependency.clone()),
                _ => None,
            })
            .collect();
        pending.sort_by_key(|d| d.id);
        pending
    }

    /// Records that a dependency resolved to an asset, replacing any
    /// previous resolution edge.
    ///
    /// The target asset node must already exist.
    pub fn mark_resolved(&mut self, dep_id: DependencyId, asset_id: AssetId) {
        let Some(&dep_node) = self.dep_index.get(&dep_id) else {
            return;
        };
        let Some(&asset_node) = self.asset_index.get(&asset_id) else {
            return;
        };

        let stale: Vec<_> = self
            .graph
            .edges_directed(dep_node, Direction::Outgoing)
            .filter(|e| *e.weight() == AssetGraphEdge::ResolvesTo)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        self.graph
            .add_edge(dep_node, asset_node, AssetGraphEdge::ResolvesTo);
        if let Some(AssetGraphNode::Dependency { state, .. }) = self.graph.node_weight_mut(dep_node)
        {
            *state = ResolutionState::Resolved(asset_id);
        }
    }

    /// Marks a dependency as excluded (external, or a dropped optional).
    pub fn mark_excluded(&mut self, dep_id: DependencyId) {
        self.set_state(dep_id, ResolutionState::Excluded);
    }

    /// Marks a dependency as failed. Failed resolutions are re-checked on
    /// every filesystem create event.
    pub fn mark_failed(&mut self, dep_id: DependencyId) {
        self.set_state(dep_id, ResolutionState::Failed);
    }

    fn set_state(&mut self, dep_id: DependencyId, new_state: ResolutionState) {
        if let Some(&node) = self.dep_index.get(&dep_id) {
            if let Some(AssetGraphNode::Dependency { state, .. }) = self.graph.node_weight_mut(node)
            {
                *state = new_state;
            }
        }
    }

    /// Returns failed or excluded-optional resolutions to Pending so the
    /// next build pass re-checks them. Returns how many were re-queued.
    ///
    /// The conservative rule for newly created files: any resolution that
    /// previously failed (or was dropped as optional) might now succeed.
    pub fn retry_failed_resolutions(&mut self) -> usize {
        let mut retried = 0;
        for node in self.graph.node_weights_mut() {
            if let AssetGraphNode::Dependency { state, .. } = node {
                if matches!(state, ResolutionState::Failed | ResolutionState::Excluded) {
                    *state = ResolutionState::Pending;
                    retried += 1;
                }
            }
        }
        retried
    }

    /// Inserts or refreshes an asset node.
    ///
    /// If the id is already present the node is revalidated in place and
    /// `false` is returned. If a different asset existed at the same path
    /// and environment (the file's content changed), that node is replaced
    /// and the incoming resolution edges are re-pointed at the new asset.
    /// Returns `true` when the graph gained a new asset id.
    pub fn upsert_asset(&mut self, asset: Asset) -> bool {
        if let Some(&node) = self.asset_index.get(&asset.id) {
            if let Some(AssetGraphNode::Asset { asset: slot, valid }) =
                self.graph.node_weight_mut(node)
            {
                *slot = asset;
                *valid = true;
            }
            return false;
        }

        // A changed file produces a new id at the same path; the old node is
        // replaced and its resolvers re-pointed.
        let predecessor_deps: Vec<DependencyId> = self
            .find_asset_at(&asset.file_path, &asset.env)
            .map(|old_node| {
                let deps = self.resolvers_of(old_node);
                self.remove_asset_node(old_node);
                deps
            })
            .unwrap_or_default();

        let id = asset.id;
        let path = asset.file_path.clone();
        let node = self.graph.add_node(AssetGraphNode::Asset { asset, valid: true });
        self.asset_index.insert(id, node);
        self.path_index.entry(path).or_default().push(node);

        for dep_id in predecessor_deps {
            self.mark_resolved(dep_id, id);
        }
        true
    }

    /// Finds the asset node at a path for a given environment.
    fn find_asset_at(&self, path: &Path, env: &Environment) -> Option<NodeIndex> {
        self.path_index.get(path)?.iter().copied().find(|&node| {
            matches!(
                self.graph.node_weight(node),
                Some(AssetGraphNode::Asset { asset, .. }) if asset.env == *env
            )
        })
    }

    /// Returns the dependency ids whose resolution edges point at a node.
    fn resolvers_of(&self, node: NodeIndex) -> Vec<DependencyId> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .filter(|e| *e.weight() == AssetGraphEdge::ResolvesTo)
            .filter_map(|e| match self.graph.node_weight(e.source()) {
                Some(AssetGraphNode::Dependency { dependency, .. }) => Some(dependency.id),
                _ => None,
            })
            .collect()
    }

    /// Removes an asset node along with any of its child dependency nodes
    /// left without a parent, so a stale dependency never reaches the
    /// worklist after its declaring asset is gone.
    fn remove_asset_node(&mut self, node: NodeIndex) {
        if let Some(AssetGraphNode::Asset { asset, .. }) = self.graph.node_weight(node) {
            let id = asset.id;
            let path = asset.file_path.clone();
            self.asset_index.remove(&id);
            if let Some(nodes) = self.path_index.get_mut(&path) {
                nodes.retain(|&n| n != node);
                if nodes.is_empty() {
                    self.path_index.remove(&path);
                }
            }
        }

        let child_deps: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|e| *e.weight() == AssetGraphEdge::Child)
            .map(|e| e.target())
            .collect();
        self.graph.remove_node(node);

        for dep_node in child_deps {
            let orphaned = self
                .graph
                .edges_directed(dep_node, Direction::Incoming)
                .all(|e| *e.weight() != AssetGraphEdge::Child);
            if orphaned {
                if let Some(AssetGraphNode::Dependency { dependency, .. }) =
                    self.graph.node_weight(dep_node)
                {
                    self.dep_index.remove(&dependency.id);
                    self.graph.remove_node(dep_node);
                }
            }
        }
    }

    /// Marks every asset at the given path invalid, forcing a re-transform
    /// on the next build pass. Returns the affected asset ids.
    pub fn invalidate_assets_at_path(&mut self, path: &Path) -> Vec<AssetId> {
        let nodes: Vec<NodeIndex> = self.path_index.get(path).cloned().unwrap_or_default();
        let mut invalidated = Vec::new();
        for node in nodes {
            if let Some(AssetGraphNode::Asset { asset, valid }) = self.graph.node_weight_mut(node) {
                *valid = false;
                invalidated.push(asset.id);
            }
        }
        invalidated
    }

    /// Removes every asset at the given path (the file was deleted) and
    /// returns the resolutions that pointed at them to Pending, so the next
    /// pass re-resolves (and likely fails or drops) them.
    pub fn remove_assets_at_path(&mut self, path: &Path) -> Vec<AssetId> {
        let nodes: Vec<NodeIndex> = self.path_index.get(path).cloned().unwrap_or_default();
        let mut removed = Vec::new();
        for node in nodes {
            let resolvers = self.resolvers_of(node);
            if let Some(AssetGraphNode::Asset { asset, .. }) = self.graph.node_weight(node) {
                removed.push(asset.id);
            }
            self.remove_asset_node(node);
            for dep_id in resolvers {
                self.set_state(dep_id, ResolutionState::Pending);
            }
        }
        removed
    }

    /// Returns clones of all invalid assets, sorted by id.
    pub fn invalid_assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .graph
            .node_weights()
            .filter_map(|node| match node {
                AssetGraphNode::Asset { asset, valid: false } => Some(asset.clone()),
                _ => None,
            })
            .collect();
        assets.sort_by_key(|a| a.id);
        assets
    }

    /// Returns `true` if any dependency is pending or any asset is invalid.
    pub fn is_invalid(&self) -> bool {
        self.graph.node_weights().any(|node| {
            matches!(
                node,
                AssetGraphNode::Dependency {
                    state: ResolutionState::Pending,
                    ..
                } | AssetGraphNode::Asset { valid: false, .. }
            )
        })
    }

    /// Removes every node no longer reachable from the root.
    ///
    /// Cycle-safe: reachability is computed with a visited set, so mutually
    /// dependent assets are kept as long as something reachable refers to
    /// them. Returns the removed asset ids.
    pub fn prune_unreachable(&mut self) -> Vec<AssetId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.root]);
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
                queue.push_back(neighbor);
            }
        }

        let unreachable: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| !visited.contains(n))
            .collect();

        let mut removed_assets = Vec::new();
        for node in unreachable {
            match self.graph.node_weight(node) {
                Some(AssetGraphNode::Asset { asset, .. }) => {
                    removed_assets.push(asset.id);
                    self.remove_asset_node(node);
                }
                Some(AssetGraphNode::Dependency { dependency, .. }) => {
                    self.dep_index.remove(&dependency.id);
                    self.graph.remove_node(node);
                }
                Some(AssetGraphNode::Entry(path)) => {
                    self.entry_index.remove(path);
                    self.graph.remove_node(node);
                }
                _ => {
                    self.graph.remove_node(node);
                }
            }
        }
        removed_assets.sort();
        removed_assets
    }

    /// Returns the node index of an asset, if present.
    pub fn asset_node(&self, id: AssetId) -> Option<NodeIndex> {
        self.asset_index.get(&id).copied()
    }

    /// Looks up an asset by id.
    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        let node = *self.asset_index.get(&id)?;
        match self.graph.node_weight(node)? {
            AssetGraphNode::Asset { asset, .. } => Some(asset),
            _ => None,
        }
    }

    /// Looks up a dependency by id.
    pub fn dependency(&self, id: DependencyId) -> Option<&Dependency> {
        let node = *self.dep_index.get(&id)?;
        match self.graph.node_weight(node)? {
            AssetGraphNode::Dependency { dependency, .. } => Some(dependency),
            _ => None,
        }
    }

    /// Returns the asset a dependency resolved to, if it resolved.
    pub fn resolved_target(&self, id: DependencyId) -> Option<AssetId> {
        let node = *self.dep_index.get(&id)?;
        match self.graph.node_weight(node)? {
            AssetGraphNode::Dependency {
                state: ResolutionState::Resolved(asset_id),
                ..
            } => Some(*asset_id),
            _ => None,
        }
    }

    /// Entry dependencies in registration order.
    pub fn entry_dependencies(&self) -> Vec<Dependency> {
        self.entry_order
            .iter()
            .filter_map(|id| self.dependency(*id).cloned())
            .collect()
    }

    /// Iterates over all assets in the graph.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.graph.node_weights().filter_map(|node| match node {
            AssetGraphNode::Asset { asset, .. } => Some(asset),
            _ => None,
        })
    }

    /// Returns the number of asset nodes.
    pub fn asset_count(&self) -> usize {
        self.asset_index.len()
    }

    /// Returns `true` if any asset was built from the given path.
    pub fn has_path(&self, path: &Path) -> bool {
        self.path_index.contains_key(path)
    }

    /// Returns the id of the still-valid asset at a path for an
    /// environment, if one exists.
    pub fn valid_asset_at(&self, path: &Path, env: &Environment) -> Option<AssetId> {
        let node = self.find_asset_at(path, env)?;
        match self.graph.node_weight(node) {
            Some(AssetGraphNode::Asset { asset, valid: true }) => Some(asset.id),
            _ => None,
        }
    }
}
