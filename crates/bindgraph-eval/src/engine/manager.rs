use bindgraph_common::{PropertyPath, node_key};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;

use super::graph::DependencyGraph;
use super::references::{EntityKeys, Extraction, KeyIndex, ReferenceExtractor, Relation};
use crate::config::EngineConfig;
use crate::error::{GraphError, ManagerError};

/// Domain layer over [`DependencyGraph`]: keeps the graph acyclic and knows
/// which entity paths exist.
#[derive(Debug, Clone)]
pub struct DependencyManager {
    graph: DependencyGraph,
    keys: KeyIndex,
    /// Nodes whose latest edit was rejected, with the cycle it would close.
    rejections: FxHashMap<String, GraphError>,
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DependencyManager {
    pub fn new(config: &EngineConfig) -> Self {
        let graph = if config.tolerate_cycles {
            DependencyGraph::tolerating_cycles()
        } else {
            DependencyGraph::new()
        };
        Self {
            graph,
            keys: KeyIndex::new(),
            rejections: FxHashMap::default(),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn keys(&self) -> &KeyIndex {
        &self.keys
    }

    pub fn entity_keys(&self, id: &str) -> Option<&EntityKeys> {
        self.keys.get(id)
    }

    /// Register (or refresh) the paths an entity exposes to resolution.
    pub fn set_entity_keys(&mut self, id: &str, keys: EntityKeys) {
        self.keys.insert(id.to_string(), keys);
    }

    /// Dependencies of the raw value at `entity.path`, resolved against the
    /// live key index.
    pub fn analyze(&self, raw: &JsonValue, entity: &str, path: &PropertyPath) -> Extraction {
        ReferenceExtractor::new(&self.keys).extract(raw, entity, path)
    }

    /// The cycle that rejected the latest edit of `node`, if any.
    pub fn rejection(&self, node: &str) -> Option<&GraphError> {
        self.rejections.get(node)
    }

    pub fn rejected_nodes(&self) -> impl Iterator<Item = &str> {
        self.rejections.keys().map(String::as_str)
    }

    /// Add relations, all or nothing. Each edge is checked for a cycle before
    /// it is inserted; on rejection every edge added by this call is removed.
    pub fn commit(&mut self, relations: &[Relation]) -> Result<(), ManagerError> {
        let mut added: Vec<(String, String)> = Vec::new();
        for relation in relations {
            let (from, to) = (relation.dependency_key(), relation.dependent_key());
            if let Some(path) = self.graph.trial_cycle(&from, &to) {
                for (f, t) in added.iter().rev() {
                    self.graph.remove_edge(f, t);
                }
                return Err(self.reject(to, path));
            }
            if self.graph.add_edge(&from, &to) {
                added.push((from, to));
            }
        }
        Ok(())
    }

    /// Replace every incoming edge of `entity.path` with `extraction`.
    ///
    /// All new edges are checked before anything changes; a cyclic edit is
    /// rejected and the node keeps its previous edges.
    pub fn replace_dependencies_for_path(
        &mut self,
        entity: &str,
        path: &PropertyPath,
        extraction: &Extraction,
    ) -> Result<(), ManagerError> {
        let node = node_key(entity, path);
        for relation in &extraction.dependencies {
            if let Some(cycle) = self.graph.trial_cycle(&relation.dependency_key(), &node) {
                return Err(self.reject(node, cycle));
            }
        }
        self.rejections.remove(&node);

        // Pin first so dropping the old edges cannot prune the node.
        self.graph.add_node(&node);
        let old: Vec<String> = self
            .graph
            .dependencies_of(&node)
            .into_iter()
            .map(str::to_string)
            .collect();
        for dep in &old {
            self.graph.remove_edge(dep, &node);
        }
        for relation in &extraction.dependencies {
            self.graph.add_edge(&relation.dependency_key(), &node);
        }
        if !extraction.is_code {
            self.graph.unpin_node(&node);
        }
        Ok(())
    }

    fn reject(&mut self, node: String, path: Vec<String>) -> ManagerError {
        let source = GraphError::Cycle { path };
        #[cfg(feature = "tracing")]
        tracing::debug!(node = %node, error = %source, "rejected cyclic dependency edit");
        self.rejections.insert(node.clone(), source.clone());
        ManagerError::CycleRejected { node, source }
    }

    /// Forget one path: drop its incoming edges and unpin it. The node stays
    /// as long as something still reads it.
    pub fn remove_path(&mut self, entity: &str, path: &PropertyPath) {
        let node = node_key(entity, path);
        self.rejections.remove(&node);
        let old: Vec<String> = self
            .graph
            .dependencies_of(&node)
            .into_iter()
            .map(str::to_string)
            .collect();
        for dep in &old {
            self.graph.remove_edge(dep, &node);
        }
        self.graph.unpin_node(&node);
    }

    /// Remove every node of an entity, all edges touching them, and its keys.
    pub fn remove_entity(&mut self, id: &str) {
        let owned = |key: &str| {
            key.strip_prefix(id)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        };
        let doomed: Vec<String> = self
            .graph
            .node_keys()
            .into_iter()
            .filter(|k| owned(k))
            .map(str::to_string)
            .collect();
        for key in &doomed {
            self.graph.remove_node(key);
        }
        self.rejections.retain(|key, _| !owned(key));
        self.keys.remove(id);
    }

    /// Drop all nodes, edges and keys.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.keys.clear();
        self.rejections.clear();
    }

    /// Process-wide evaluation order, dependencies first.
    ///
    /// # Panics
    /// When committed state contains a cycle, which means the commit-time
    /// guard was bypassed.
    pub fn topological_order(&self) -> Vec<String> {
        match self.graph.topological_order(false) {
            Ok(order) => order,
            Err(err) => panic!("committed dependency graph is cyclic: {err}"),
        }
    }

    /// Nodes with no incoming edges.
    pub fn entry_nodes(&self) -> Vec<String> {
        self.graph
            .entry_nodes()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
