use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::GraphError;

/// Arena slot of a graph node.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn as_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: String,
    /// Nodes this one reads (incoming edges).
    dependencies: SmallVec<[NodeId; 4]>,
    /// Nodes reading this one (outgoing edges).
    dependents: SmallVec<[NodeId; 4]>,
    /// Added explicitly; survives without edges. Implicit nodes exist only
    /// while an edge touches them.
    pinned: bool,
}

impl Node {
    fn is_edgeless(&self) -> bool {
        self.dependencies.is_empty() && self.dependents.is_empty()
    }
}

/// Directed graph over opaque string keys; an edge `from -> to` means `to`
/// reads `from`, so `from` must be computed first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Option<Node>>,
    index: FxHashMap<String, NodeId>,
    free: Vec<NodeId>,
    tolerate_cycles: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph whose topological sort skips back-edges instead of failing.
    pub fn tolerating_cycles() -> Self {
        Self {
            tolerate_cycles: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop every node and edge, keeping the cycle policy.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.free.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn is_pinned(&self, key: &str) -> bool {
        self.node_by_key(key).is_some_and(|n| n.pinned)
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.as_index()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling node id {id:?}"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.as_index()]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling node id {id:?}"))
    }

    fn node_by_key(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|&id| self.node(id))
    }

    fn insert(&mut self, key: &str, pinned: bool) -> NodeId {
        if let Some(&id) = self.index.get(key) {
            if pinned {
                self.node_mut(id).pinned = true;
            }
            return id;
        }
        let node = Node {
            key: key.to_string(),
            dependencies: SmallVec::new(),
            dependents: SmallVec::new(),
            pinned,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.as_index()] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() as u32 - 1)
            }
        };
        self.index.insert(key.to_string(), id);
        id
    }

    fn discard(&mut self, id: NodeId) {
        if let Some(node) = self.nodes[id.as_index()].take() {
            self.index.remove(&node.key);
            self.free.push(id);
        }
    }

    /// Drop an implicit node once nothing touches it.
    fn prune(&mut self, id: NodeId) {
        let node = self.node(id);
        if !node.pinned && node.is_edgeless() {
            self.discard(id);
        }
    }

    /// Add (or pin) a node. Pinned nodes stay until removed or unpinned.
    pub fn add_node(&mut self, key: &str) {
        self.insert(key, true);
    }

    /// Turn a pinned node back into an implicit one, pruning it if edgeless.
    pub fn unpin_node(&mut self, key: &str) {
        if let Some(&id) = self.index.get(key) {
            self.node_mut(id).pinned = false;
            self.prune(id);
        }
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, key: &str) -> bool {
        let Some(&id) = self.index.get(key) else {
            return false;
        };
        let node = self.node(id).clone();
        for dep in node.dependencies.into_iter().filter(|d| *d != id) {
            self.node_mut(dep).dependents.retain(|d| *d != id);
            self.prune(dep);
        }
        for dependent in node.dependents.into_iter().filter(|d| *d != id) {
            self.node_mut(dependent).dependencies.retain(|d| *d != id);
            self.prune(dependent);
        }
        self.discard(id);
        true
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&f), Some(&t)) => self.node(f).dependents.contains(&t),
            _ => false,
        }
    }

    /// Add `from -> to`, creating implicit nodes as needed. Returns false when
    /// the edge already existed.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let f = self.insert(from, false);
        let t = self.insert(to, false);
        if self.node(f).dependents.contains(&t) {
            return false;
        }
        self.node_mut(f).dependents.push(t);
        self.node_mut(t).dependencies.push(f);
        true
    }

    /// Remove `from -> to`; endpoints left without edges are pruned unless pinned.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if !self.node(f).dependents.contains(&t) {
            return false;
        }
        self.node_mut(f).dependents.retain(|d| *d != t);
        self.node_mut(t).dependencies.retain(|d| *d != f);
        self.prune(f);
        if f != t {
            self.prune(t);
        }
        true
    }

    /// Trial-insert `from -> to`, check the whole graph for a cycle, then
    /// revert the trial regardless of the outcome.
    pub fn would_create_cycle(&mut self, from: &str, to: &str) -> bool {
        self.trial_cycle(from, to).is_some()
    }

    /// Like [`would_create_cycle`](Self::would_create_cycle), returning the
    /// cycle the edge would close (first node repeated at the end).
    pub fn trial_cycle(&mut self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string(), to.to_string()]);
        }
        let from_existed = self.contains(from);
        let to_existed = self.contains(to);
        let added = self.add_edge(from, to);

        let cycle = self.find_cycle().map(|ids| self.keys_of(&ids));

        if added {
            self.remove_edge(from, to);
        }
        if !from_existed {
            self.remove_node(from);
        }
        if !to_existed {
            self.remove_node(to);
        }
        cycle
    }

    /// Keys of the nodes `key` reads.
    pub fn dependencies_of(&self, key: &str) -> Vec<&str> {
        self.node_by_key(key)
            .map(|n| n.dependencies.iter().map(|&d| self.node(d).key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Keys of the nodes reading `key`.
    pub fn dependents_of(&self, key: &str) -> Vec<&str> {
        self.node_by_key(key)
            .map(|n| n.dependents.iter().map(|&d| self.node(d).key.as_str()).collect())
            .unwrap_or_default()
    }

    /// All node keys, sorted.
    pub fn node_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.index.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// All edges as `(from, to)`, sorted.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .nodes
            .iter()
            .flatten()
            .flat_map(|n| {
                n.dependents
                    .iter()
                    .map(move |&d| (n.key.as_str(), self.node(d).key.as_str()))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Nodes with no incoming edges.
    pub fn entry_nodes(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.dependencies.is_empty())
            .map(|n| n.key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Roots in a stable order so repeated sorts agree.
    fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<(&str, NodeId)> =
            self.index.iter().map(|(k, &id)| (k.as_str(), id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Depth-first post-order over dependencies with an explicit stack.
    ///
    /// `Err(path)` carries the cycle (first node repeated at the end) unless
    /// cycles are tolerated, in which case back-edges are skipped.
    fn dfs_order(&self, tolerate: bool) -> Result<Vec<NodeId>, Vec<NodeId>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.index.len());
        // (node, index of the next dependency to visit)
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for root in self.sorted_ids() {
            if marks[root.as_index()] != Mark::Unvisited {
                continue;
            }
            marks[root.as_index()] = Mark::OnPath;
            stack.push((root, 0));

            while let Some((id, next)) = stack.last_mut() {
                let id = *id;
                let deps = &self.node(id).dependencies;
                if *next < deps.len() {
                    let dep = deps[*next];
                    *next += 1;
                    match marks[dep.as_index()] {
                        Mark::Unvisited => {
                            marks[dep.as_index()] = Mark::OnPath;
                            stack.push((dep, 0));
                        }
                        Mark::OnPath if !tolerate => {
                            let start = stack
                                .iter()
                                .position(|(n, _)| *n == dep)
                                .unwrap_or(0);
                            // The stack runs dependent -> dependency; report in
                            // edge direction (dependency first).
                            let mut cycle: Vec<NodeId> =
                                stack[start..].iter().map(|(n, _)| *n).collect();
                            cycle.reverse();
                            cycle.push(cycle[0]);
                            return Err(cycle);
                        }
                        Mark::OnPath | Mark::Done => {}
                    }
                } else {
                    marks[id.as_index()] = Mark::Done;
                    order.push(id);
                    stack.pop();
                }
            }
        }
        Ok(order)
    }

    fn find_cycle(&self) -> Option<Vec<NodeId>> {
        self.dfs_order(false).err()
    }

    fn keys_of(&self, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| self.node(id).key.clone()).collect()
    }

    /// Every node after all of its dependencies.
    ///
    /// With `leaves_only`, only nodes nothing else depends on (the final
    /// consumers) are returned, still in dependency order.
    pub fn topological_order(&self, leaves_only: bool) -> Result<Vec<String>, GraphError> {
        let order = self
            .dfs_order(self.tolerate_cycles)
            .map_err(|cycle| GraphError::Cycle {
                path: self.keys_of(&cycle),
            })?;
        Ok(order
            .into_iter()
            .filter(|&id| !leaves_only || self.node(id).dependents.is_empty())
            .map(|id| self.node(id).key.clone())
            .collect())
    }
}
