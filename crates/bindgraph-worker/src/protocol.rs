//! Messages exchanged with the engine thread.
//!
//! Both directions are internally tagged by `type` with camelCase names, so a
//! request reads `{"type": "updateEntity", "id": "Input1", "path": "text", "value": "hi"}`.

use std::collections::BTreeMap;

use bindgraph_eval::{ActionExecution, DiffOp, EntityConfig, EntityKind, PropertyPath};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Configs keyed by entity id; the id inside each config may be omitted.
pub type EntityMap = BTreeMap<String, EntityConfig>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Load every entity and re-analyze from scratch.
    Init {
        current_page_id: String,
        #[serde(default)]
        queries: EntityMap,
        #[serde(default)]
        pages: BTreeMap<String, EntityMap>,
        #[serde(default)]
        globals: EntityMap,
    },
    UpdateEntity {
        id: String,
        path: PropertyPath,
        value: JsonValue,
    },
    AddEntity {
        entity_type: EntityKind,
        config: EntityConfig,
    },
    RemoveEntity {
        id: String,
    },
    ChangePage {
        current_page_id: String,
    },
    /// Run the handler stored at `id.eventName` as an action block.
    EventExecution {
        id: String,
        event_name: String,
    },
    /// Applied in order, followed by a single evaluation.
    Batch {
        requests: Vec<Request>,
    },
    /// Stop the engine thread once the current batch is applied.
    Shutdown,
}

impl Request {
    /// True for requests that change the entity set or raw values.
    pub fn is_mutation(&self) -> bool {
        match self {
            Request::Init { .. }
            | Request::UpdateEntity { .. }
            | Request::AddEntity { .. }
            | Request::RemoveEntity { .. }
            | Request::ChangePage { .. } => true,
            Request::Batch { requests } => requests.iter().any(Request::is_mutation),
            Request::EventExecution { .. } | Request::Shutdown => false,
        }
    }

    /// Nested batches flattened into arrival order.
    pub fn flatten(self, out: &mut Vec<Request>) {
        match self {
            Request::Batch { requests } => {
                for request in requests {
                    request.flatten(out);
                }
            }
            other => out.push(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    /// Diffs against the snapshot delivered before.
    EvaluationUpdate {
        evaluation_updates: Vec<DiffOp>,
        runtime_error_updates: Vec<DiffOp>,
        validation_error_updates: Vec<DiffOp>,
    },
    /// Side effects requested by an event handler, in call order.
    ActionExecution {
        executions: Vec<ActionExecution>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn is_empty_update(&self) -> bool {
        matches!(
            self,
            Response::EvaluationUpdate { evaluation_updates, runtime_error_updates, validation_error_updates }
                if evaluation_updates.is_empty()
                    && runtime_error_updates.is_empty()
                    && validation_error_updates.is_empty()
        )
    }
}
