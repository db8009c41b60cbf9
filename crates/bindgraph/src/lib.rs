//! Meta crate that re-exports the bindgraph layers with sensible defaults.
//! Downstream users can depend on this crate and opt into specific layers
//! via feature flags while keeping access to the underlying crates.

#[cfg(feature = "common")]
pub use bindgraph_common as common;

#[cfg(feature = "parse")]
pub use bindgraph_parse as parse;

#[cfg(feature = "eval")]
pub use bindgraph_eval as eval;

#[cfg(feature = "worker")]
pub use bindgraph_worker as worker;

#[cfg(feature = "common")]
pub use bindgraph_common::{BindError, BindErrorKind, EntityKind, EntityRef, PropertyPath};

#[cfg(feature = "eval")]
pub use bindgraph_eval::{
    DiffOp, EngineConfig, EntityConfig, EvalOutput, EvaluationEngine, PropertySchema, SchemaType,
};

#[cfg(feature = "worker")]
pub use bindgraph_worker::{BrokerConfig, EngineHandle, ForestMirror, Request, Response};

#[cfg(all(feature = "worker", feature = "tracing"))]
pub use bindgraph_worker::init_tracing;
