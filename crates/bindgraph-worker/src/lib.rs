//! Runs the binding engine on its own thread behind a typed message
//! protocol. Requests are batched; each batch yields one evaluation and one
//! diff against the snapshot the consumer already holds.

pub mod broker;
pub mod config;
pub mod error;
pub mod mirror;
pub mod protocol;
pub mod session;

pub use broker::{EngineHandle, process_batch};
pub use config::BrokerConfig;
pub use error::{BrokerError, SessionError};
pub use mirror::ForestMirror;
pub use protocol::{EntityMap, Request, Response};
pub use session::Session;

/// Install a `fmt` subscriber filtered by `BINDGRAPH_LOG` (default `info`).
/// Does nothing when a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("BINDGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
