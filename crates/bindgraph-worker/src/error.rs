use bindgraph_eval::EngineError;
use thiserror::Error;

/// A request the session could not apply. The engine thread keeps running
/// and reports it as a `Response::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown page '{0}'")]
    UnknownPage(String),
    #[error("entity id '{0}' is used more than once")]
    DuplicateEntity(String),
    #[error("entity keyed '{key}' declares id '{id}'")]
    IdMismatch { key: String, id: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("engine thread has stopped")]
    Disconnected,
    #[error("no response within the timeout")]
    Timeout,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread panicked")]
    Panicked,
}
