//! Fixtures shared by unit tests.

use bindgraph_common::{BindError, EntityKind, PropertyPath};
use serde_json::Value as JsonValue;

use crate::config::EngineConfig;
use crate::engine::{EvaluationEngine, evaluate_binding};
use crate::entity::EntityConfig;
use crate::traits::{ActionIndex, ForestContext};

pub fn path(text: &str) -> PropertyPath {
    PropertyPath::parse(text).unwrap()
}

/// Evaluate one binding expression against `{ entityId: tree }`.
pub fn eval_expr(source: &str, forest: &JsonValue) -> Result<JsonValue, BindError> {
    let config = EngineConfig::default();
    let context = ForestContext::new(forest);
    evaluate_binding(source, &context, &config).map(|v| v.to_json())
}

/// Like [`eval_expr`], with entity actions visible.
pub fn eval_expr_with_actions(
    source: &str,
    forest: &JsonValue,
    actions: &ActionIndex,
) -> Result<JsonValue, BindError> {
    let config = EngineConfig::default();
    let context = ForestContext::new(forest).with_actions(actions);
    evaluate_binding(source, &context, &config).map(|v| v.to_json())
}

fn config(id: &str, values: JsonValue, evaluable: &[&str]) -> EntityConfig {
    evaluable
        .iter()
        .fold(EntityConfig::new(id, values), |c, p| c.evaluable(p).unwrap())
}

pub fn widget(id: &str, values: JsonValue, evaluable: &[&str]) -> (EntityKind, EntityConfig) {
    (EntityKind::Widget, config(id, values, evaluable))
}

pub fn query(id: &str, values: JsonValue, evaluable: &[&str]) -> (EntityKind, EntityConfig) {
    (EntityKind::Query, config(id, values, evaluable))
}

/// Entity whose every top-level key is evaluable.
pub fn code_widget(id: &str, values: JsonValue) -> (EntityKind, EntityConfig) {
    let keys: Vec<String> = values
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    widget(id, values, &keys)
}

pub fn engine_with(entities: Vec<(EntityKind, EntityConfig)>) -> EvaluationEngine {
    let mut engine = EvaluationEngine::default();
    engine.replace_entities(entities).unwrap();
    engine
}
