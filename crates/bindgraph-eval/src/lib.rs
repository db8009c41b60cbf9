pub mod builtins;
pub mod config;
pub mod diff;
pub mod entity;
pub mod error;
pub mod interpreter;
pub mod schema;
pub mod traits;
pub mod value;

pub mod engine;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use diff::{DiffOp, apply_error_tree, apply_forest, diff_error_tree, diff_forest};
pub use engine::{
    DependencyGraph, DependencyManager, ErrorRecord, EvalOutput, EvaluationEngine, EventOutcome,
    NodeErrors,
};
pub use entity::{Entity, EntityConfig, ValueStore};
pub use error::{EngineError, GraphError, ManagerError};
pub use interpreter::{ActionExecution, ExecutionMode, Interpreter};
pub use schema::{PropertySchema, SchemaType, SchemaValidator};
pub use traits::{EvaluationContext, ForestContext};
pub use value::Value;

// Re-export common types
pub use bindgraph_common::{EntityKind, EntityRef, PropertyPath};
