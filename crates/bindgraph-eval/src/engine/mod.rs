//! Dependency tracking and scheduled evaluation.
//!
//! - [`graph`]: generic acyclic graph over string keys
//! - [`references`]: resolving binding chains to `entity.path` relations
//! - [`manager`]: the domain layer that keeps committed state acyclic
//! - [`eval`]: the engine that owns entities and recomputes the forest

pub mod eval;
pub mod graph;
pub mod manager;
pub mod references;

#[cfg(test)]
mod tests;

pub use eval::{
    ErrorRecord, EvalOutput, EvaluationEngine, EventOutcome, NodeErrors, evaluate_binding,
    evaluate_raw,
};
pub use graph::DependencyGraph;
pub use manager::DependencyManager;
pub use references::{EntityKeys, Extraction, KeyIndex, ReferenceExtractor, Relation};
