use bindgraph_common::PropertyPath;
use rustc_hash::FxHashMap;

/// What a binding can see while it runs: the evaluated forest so far, and
/// the action names each entity exposes.
pub trait EvaluationContext {
    /// The current (partially evaluated) value tree of an entity.
    fn entity_value(&self, id: &str) -> Option<&serde_json::Value>;

    /// Action names declared by an entity.
    fn actions_of(&self, _id: &str) -> &[String] {
        &[]
    }

    fn resolve_path(&self, id: &str, path: &PropertyPath) -> Option<&serde_json::Value> {
        self.entity_value(id).and_then(|v| path.get(v))
    }
}

pub type ActionIndex = FxHashMap<String, Vec<String>>;

/// Context backed by a forest object `{ entityId: tree }`.
pub struct ForestContext<'a> {
    forest: &'a serde_json::Value,
    actions: Option<&'a ActionIndex>,
}

impl<'a> ForestContext<'a> {
    pub fn new(forest: &'a serde_json::Value) -> Self {
        Self {
            forest,
            actions: None,
        }
    }

    pub fn with_actions(mut self, actions: &'a ActionIndex) -> Self {
        self.actions = Some(actions);
        self
    }
}

impl EvaluationContext for ForestContext<'_> {
    fn entity_value(&self, id: &str) -> Option<&serde_json::Value> {
        self.forest.get(id)
    }

    fn actions_of(&self, id: &str) -> &[String] {
        self.actions
            .and_then(|a| a.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
