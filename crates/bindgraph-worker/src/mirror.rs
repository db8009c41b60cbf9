use bindgraph_common::PathError;
use bindgraph_eval::{PropertyPath, apply_error_tree, apply_forest};
use serde_json::{Map, Value as JsonValue};

use crate::protocol::Response;

/// Consumer-side copy of the delivered snapshot, rebuilt from diffs only.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestMirror {
    forest: JsonValue,
    evaluation_errors: JsonValue,
    validation_errors: JsonValue,
}

impl Default for ForestMirror {
    fn default() -> Self {
        let empty = JsonValue::Object(Map::new());
        Self {
            forest: empty.clone(),
            evaluation_errors: empty.clone(),
            validation_errors: empty,
        }
    }
}

impl ForestMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an evaluation update; other responses are ignored. Returns
    /// whether anything was applied.
    pub fn apply(&mut self, response: &Response) -> Result<bool, PathError> {
        let Response::EvaluationUpdate {
            evaluation_updates,
            runtime_error_updates,
            validation_error_updates,
        } = response
        else {
            return Ok(false);
        };
        apply_forest(&mut self.forest, evaluation_updates)?;
        apply_error_tree(&mut self.evaluation_errors, runtime_error_updates);
        apply_error_tree(&mut self.validation_errors, validation_error_updates);
        Ok(true)
    }

    pub fn forest(&self) -> &JsonValue {
        &self.forest
    }

    pub fn value(&self, entity: &str, path: &PropertyPath) -> Option<&JsonValue> {
        path.get(self.forest.get(entity)?)
    }

    /// `{ entityId: { path: [message] } }`
    pub fn evaluation_errors(&self) -> &JsonValue {
        &self.evaluation_errors
    }

    pub fn validation_errors(&self) -> &JsonValue {
        &self.validation_errors
    }

    pub fn errors_at(&self, entity: &str, path: &str) -> Vec<String> {
        self.evaluation_errors
            .get(entity)
            .and_then(|paths| paths.get(path))
            .and_then(JsonValue::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
