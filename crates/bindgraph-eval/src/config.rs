use serde::Deserialize;

/// Configuration for the evaluation engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Let topological sorting skip back-edges instead of failing. Committed
    /// state never contains cycles, so this is only useful when inspecting a
    /// graph built by hand.
    pub tolerate_cycles: bool,
    /// Interpreter call depth before a `RangeError` is raised.
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerate_cycles: false,
            max_call_depth: 256,
        }
    }
}

impl EngineConfig {
    pub fn diagnostics() -> Self {
        Self {
            tolerate_cycles: true,
            ..Self::default()
        }
    }
}
