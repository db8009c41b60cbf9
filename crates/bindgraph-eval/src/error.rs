//! Operation-level failures of the graph, manager and engine.
//!
//! Node-local problems (syntax, runtime, validation) are never Rust errors:
//! they are recorded as [`BindError`](bindgraph_common::BindError) strings in
//! the error tree of a pass.

use bindgraph_common::PathError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

impl GraphError {
    /// The cycle path, first node repeated at the end.
    pub fn cycle_path(&self) -> Option<&[String]> {
        match self {
            GraphError::Cycle { path } => Some(path),
            GraphError::UnknownNode(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The edit would close a cycle; the property keeps its previous edges.
    #[error("dependency edit on '{node}' rejected: {source}")]
    CycleRejected {
        node: String,
        #[source]
        source: GraphError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("'{0}' is not a valid entity id")]
    InvalidEntityId(String),
    #[error("entity '{0}' values must be a JSON object")]
    ValuesNotObject(String),
    #[error("entity '{entity}' has an invalid schema at '{path}': {message}")]
    InvalidSchema {
        entity: String,
        path: String,
        message: String,
    },
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
}
