//! HTTP server lifecycle.
//!
//! # Responsibilities
//! - Init: allow list, endpoints, bound sockets, work queue, dispatcher
//! - Start: reactor thread, then the worker pool
//! - Interrupt: reject new requests with 503 and stop the queue
//! - Stop: join workers, answer queued requests, drain connections
//! - Handler registration at any time
//!
//! # Design Decisions
//! - Lifecycle calls take `&mut self`; only one thread drives the lifecycle
//! - Handler table and request callback live behind `ArcSwap`, so the
//!   reactor reads them without locks while registration swaps them
//! - A failed Start tears down what it started and leaves the server Stopped

use arc_swap::ArcSwap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::validation::{join_errors, validate_config, ValidationError};
use crate::config::ServerConfig;
use crate::http::dispatcher::{Dispatcher, RequestCallback};
use crate::http::handler::HttpHandler;
use crate::http::reactor::{ConnectionSettings, Reactor, ReactorError};
use crate::http::work_queue::{WorkItem, WorkQueue};
use crate::http::worker::WorkerPool;
use crate::lifecycle::{ServerState, Shutdown};
use crate::net::listener::{bind_all, resolve_endpoints};
use crate::net::{BoundListener, ConnectionTracker, ListenerError};
use crate::routing::{MatchMode, PathHandlerTable};
use crate::security::{AllowList, AllowListError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid HTTP server configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    AllowList(#[from] AllowListError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Unable to bind any endpoint for RPC server")]
    NoEndpoints,

    #[error("cannot {op} an HTTP server that is {state}")]
    InvalidState { op: &'static str, state: ServerState },

    #[error("failed to spawn HTTP worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Reactor(#[from] ReactorError),
}

/// The request-serving core.
pub struct HttpServer {
    config: ServerConfig,
    state: ServerState,
    handlers: Arc<ArcSwap<PathHandlerTable>>,
    callback: Arc<ArcSwap<RequestCallback>>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    queue: Option<Arc<WorkQueue<WorkItem>>>,
    listeners: Vec<BoundListener>,
    local_addrs: Vec<SocketAddr>,
    workers: Option<WorkerPool>,
    reactor: Option<Reactor>,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: ServerState::Uninitialized,
            handlers: Arc::new(ArcSwap::from_pointee(PathHandlerTable::new())),
            callback: Arc::new(ArcSwap::from_pointee(RequestCallback::Reject)),
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            queue: None,
            listeners: Vec::new(),
            local_addrs: Vec::new(),
            workers: None,
            reactor: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Addresses actually bound, after Init.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Requests waiting for a worker.
    pub fn queued_requests(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.len())
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Flag raised at Interrupt.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Add a handler. Later registrations are matched after earlier ones.
    pub fn register_handler<H>(&self, prefix: impl Into<String>, mode: MatchMode, handler: H)
    where
        H: HttpHandler + 'static,
    {
        let prefix = prefix.into();
        let handler: Arc<dyn HttpHandler> = Arc::new(handler);
        self.handlers.rcu(|table| {
            let mut table = PathHandlerTable::clone(table);
            table.register(prefix.clone(), mode, Arc::clone(&handler));
            table
        });
    }

    /// Remove the first handler registered under exactly this prefix and mode.
    pub fn unregister_handler(&self, prefix: &str, mode: MatchMode) -> bool {
        let mut removed = false;
        self.handlers.rcu(|table| {
            let mut table = PathHandlerTable::clone(table);
            removed = table.unregister(prefix, mode);
            table
        });
        removed
    }

    /// Build the allow list, bind the endpoints and create the work queue.
    pub fn init(&mut self) -> Result<(), ServerError> {
        self.expect_state("initialize", ServerState::Uninitialized)?;
        tracing::debug!("Initializing HTTP server");
        validate_config(&self.config).map_err(ServerError::Config)?;

        let rpc = &self.config.rpc;
        let allow_list = AllowList::from_entries(&rpc.allow_ip)?;
        let endpoints = resolve_endpoints(rpc)?;
        let listeners = bind_all(&endpoints);
        if listeners.is_empty() {
            tracing::error!("Unable to bind any endpoint for RPC server");
            return Err(ServerError::NoEndpoints);
        }

        let depth = rpc.work_queue_depth();
        tracing::info!("creating work queue of depth {}", depth);
        let queue = Arc::new(WorkQueue::new(depth));

        self.callback.store(Arc::new(RequestCallback::Dispatch(Dispatcher::new(
            allow_list,
            Arc::clone(&self.handlers),
            Arc::clone(&queue),
        ))));
        self.local_addrs = listeners.iter().map(|l| l.local_addr).collect();
        self.listeners = listeners;
        self.queue = Some(queue);
        self.state = ServerState::Initialized;
        Ok(())
    }

    /// Start the reactor thread and the workers.
    pub fn start(&mut self) -> Result<(), ServerError> {
        self.expect_state("start", ServerState::Initialized)?;
        let Some(queue) = self.queue.clone() else {
            return Err(ServerError::InvalidState {
                op: "start",
                state: self.state,
            });
        };

        tracing::debug!("Starting HTTP server");
        let settings = ConnectionSettings {
            max_header_bytes: self.config.limits.max_header_bytes,
            max_body_bytes: self.config.limits.max_body_bytes(),
            idle_timeout: self.config.rpc.server_timeout(),
        };
        let reactor = match Reactor::spawn(
            std::mem::take(&mut self.listeners),
            Arc::clone(&self.callback),
            self.shutdown.clone(),
            settings,
            self.tracker.clone(),
        ) {
            Ok(reactor) => reactor,
            Err(e) => {
                self.abort_start();
                return Err(e.into());
            }
        };
        self.reactor = Some(reactor);

        let threads = self.config.rpc.worker_threads();
        tracing::info!("starting {} worker threads", threads);
        match WorkerPool::spawn(&queue, threads) {
            Ok(workers) => self.workers = Some(workers),
            Err(e) => {
                self.abort_start();
                return Err(ServerError::Spawn(e));
            }
        }

        self.state = ServerState::Running;
        Ok(())
    }

    /// Stop taking new work. New requests get 503; queued ones wait for Stop.
    pub fn interrupt(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Interrupted | ServerState::Stopped => return Ok(()),
            ServerState::Uninitialized => {
                return Err(ServerError::InvalidState {
                    op: "interrupt",
                    state: self.state,
                })
            }
            ServerState::Initialized | ServerState::Running => {}
        }

        tracing::debug!("Interrupting HTTP server");
        self.callback.store(Arc::new(RequestCallback::Reject));
        if let Some(queue) = &self.queue {
            queue.interrupt();
        }
        self.shutdown.trigger();
        self.state = ServerState::Interrupted;
        Ok(())
    }

    /// Tear everything down. Valid from any state; ends at Stopped.
    pub fn stop(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }
        if self.state.is_accepting_work() {
            // Initialized or Running: interrupt cannot fail from these states.
            let _ = self.interrupt();
        }

        tracing::debug!("Stopping HTTP server");
        if let Some(workers) = self.workers.take() {
            tracing::debug!("Waiting for HTTP worker threads to exit");
            workers.join();
        }
        if let Some(queue) = self.queue.take() {
            let released = queue.release_pending();
            if released > 0 {
                tracing::debug!(released, "Released queued requests");
            }
        }
        if let Some(reactor) = self.reactor.take() {
            tracing::debug!("Waiting for HTTP event thread to exit");
            reactor.join();
        }
        self.listeners.clear();
        self.state = ServerState::Stopped;
        tracing::debug!("Stopped HTTP server");
    }

    fn expect_state(&self, op: &'static str, expected: ServerState) -> Result<(), ServerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ServerError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    fn abort_start(&mut self) {
        tracing::error!("Failed to start HTTP server");
        self.stop();
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("state", &self.state)
            .field("local_addrs", &self.local_addrs)
            .field("queued_requests", &self.queued_requests())
            .finish()
    }
}
