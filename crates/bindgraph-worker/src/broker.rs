//! The engine thread: receives requests, coalesces them into batches and
//! answers with one diff per batch.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::protocol::{Request, Response};
use crate::session::{Session, describe};

/// Consumer side of the engine thread. Dropping it stops the thread after
/// the batch in progress.
pub struct EngineHandle {
    requests: Option<Sender<Request>>,
    responses: Receiver<Response>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn spawn(config: BrokerConfig) -> Result<Self, BrokerError> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (response_tx, response_rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.stack_size)
            .spawn(move || run(config, request_rx, response_tx))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            thread: Some(thread),
        })
    }

    /// Queue a request; never blocks on evaluation.
    pub fn send(&self, request: Request) -> Result<(), BrokerError> {
        self.requests
            .as_ref()
            .ok_or(BrokerError::Disconnected)?
            .send(request)
            .map_err(|_| BrokerError::Disconnected)
    }

    pub fn try_recv(&self) -> Result<Option<Response>, BrokerError> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BrokerError::Disconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Response, BrokerError> {
        self.responses.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => BrokerError::Timeout,
            RecvTimeoutError::Disconnected => BrokerError::Disconnected,
        })
    }

    /// Responses already delivered and not yet read.
    pub fn drain(&self) -> Vec<Response> {
        self.responses.try_iter().collect()
    }

    /// Ask the thread to stop after pending requests and wait for it.
    pub fn shutdown(mut self) -> Result<(), BrokerError> {
        self.send(Request::Shutdown)?;
        self.join()
    }

    fn join(&mut self) -> Result<(), BrokerError> {
        self.requests = None;
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| BrokerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

fn run(config: BrokerConfig, requests: Receiver<Request>, responses: Sender<Response>) {
    let mut session = Session::new(config.engine.clone());
    // Wait indefinitely for the first request of a batch, then keep
    // collecting until the flush delay passes or the batch is full.
    while let Ok(first) = requests.recv() {
        let deadline = Instant::now() + config.flush_delay;
        let mut batch = vec![first];
        while batch.len() < config.max_batch && !matches!(batch.last(), Some(Request::Shutdown)) {
            let wait = deadline.saturating_duration_since(Instant::now());
            match requests.recv_timeout(wait) {
                Ok(request) => batch.push(request),
                Err(_) => break,
            }
        }
        if !process_batch(&mut session, batch, &responses) {
            break;
        }
    }
    #[cfg(feature = "tracing")]
    tracing::debug!("engine thread stopped");
}

/// Apply a batch in arrival order and emit at most one evaluation update.
/// Returns false when the thread should stop.
pub fn process_batch(session: &mut Session, batch: Vec<Request>, out: &Sender<Response>) -> bool {
    let mut flat = Vec::with_capacity(batch.len());
    for request in batch {
        request.flatten(&mut flat);
    }
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("batch", size = flat.len()).entered();

    let mut mutated = false;
    let mut keep_running = true;
    let mut pending = Vec::new();
    for request in flat {
        let mutation = request.is_mutation();
        let result = match request {
            Request::Shutdown => {
                keep_running = false;
                break;
            }
            Request::EventExecution { id, event_name } => session
                .execute_event(&id, &event_name)
                .map(|outcome| {
                    pending.push(Response::ActionExecution {
                        executions: outcome.executions,
                        errors: outcome.errors.iter().map(describe).collect(),
                    })
                }),
            Request::Init {
                current_page_id,
                queries,
                pages,
                globals,
            } => session.init(current_page_id, queries, pages, globals),
            Request::UpdateEntity { id, path, value } => session.update_entity(&id, &path, value),
            Request::AddEntity {
                entity_type,
                config,
            } => session.add_entity(entity_type, config),
            Request::RemoveEntity { id } => session.remove_entity(&id),
            Request::ChangePage { current_page_id } => session.change_page(&current_page_id),
            Request::Batch { .. } => unreachable!("batches are flattened"),
        };
        match result {
            Ok(()) => mutated |= mutation,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, "request failed");
                pending.push(Response::Error {
                    message: err.to_string(),
                });
            }
        }
        for response in pending.drain(..) {
            if out.send(response).is_err() {
                return false;
            }
        }
    }
    if mutated && out.send(session.take_update()).is_err() {
        return false;
    }
    keep_running
}
