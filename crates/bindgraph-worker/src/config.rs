use std::time::Duration;

use bindgraph_eval::EngineConfig;
use serde::{Deserialize, Deserializer};

/// Configuration for the engine thread
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrokerConfig {
    /// How long to keep collecting requests after the first one of a batch.
    #[serde(rename = "flushDelayMs", deserialize_with = "millis")]
    pub flush_delay: Duration,
    /// Flush early once this many requests are queued.
    pub max_batch: usize,
    pub thread_name: String,
    /// Stack of the engine thread in bytes; sized for `engine.max_call_depth`.
    pub stack_size: usize,
    pub engine: EngineConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(8),
            max_batch: 256,
            thread_name: "bindgraph-engine".to_string(),
            stack_size: 16 * 1024 * 1024,
            engine: EngineConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Coalesce edits arriving within one frame.
    pub fn interactive() -> Self {
        Self::default()
    }

    /// Flush as soon as the queue is drained.
    pub fn immediate() -> Self {
        Self {
            flush_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}
