//! The reactor thread: owns every socket.
//!
//! # Data Flow
//! ```text
//! std listeners (bound during Init)
//!     → accept loop per listener (spawn_local)
//!     → hyper http1 connection per socket (spawn_local)
//!     → body collected under the size limit
//!     → RequestCallback (dispatch / reject)
//!     → await PendingReply → hyper response
//! ```
//!
//! # Design Decisions
//! - Single-threaded tokio runtime plus a `LocalSet`; nothing here is shared
//!   with workers except the one-shot reply channel
//! - Readiness is reported back to the starting thread before any request is
//!   accepted, so Start fails synchronously on setup errors
//! - Unbind is a watch flag: accept loops exit, connections get hyper's
//!   graceful shutdown, then the thread waits (bounded) for them to drain

use arc_swap::ArcSwap;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::LocalSet;

use crate::http::dispatcher::RequestCallback;
use crate::http::request::{RequestContext, RequestHead};
use crate::http::response::{into_response, status_only, HttpResponse};
use crate::lifecycle::Shutdown;
use crate::net::{BoundListener, ConnectionGuard, ConnectionTracker};

/// Pause after a failed accept, e.g. on descriptor exhaustion.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection transport limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub max_header_bytes: usize,
    pub max_body_bytes: u64,
    /// Header-read timeout; also bounds the shutdown drain.
    pub idle_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("failed to spawn HTTP event thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to set up HTTP event loop: {0}")]
    Setup(#[source] io::Error),

    #[error("HTTP event thread exited before becoming ready")]
    Exited,
}

/// State shared by every connection on the reactor.
struct Shared {
    callback: Arc<ArcSwap<RequestCallback>>,
    shutdown: Shutdown,
    settings: ConnectionSettings,
}

/// Handle to the running reactor thread.
pub struct Reactor {
    thread: JoinHandle<()>,
    unbind: watch::Sender<bool>,
}

impl Reactor {
    /// Start the `http` thread and wait until it is accepting.
    pub fn spawn(
        listeners: Vec<BoundListener>,
        callback: Arc<ArcSwap<RequestCallback>>,
        shutdown: Shutdown,
        settings: ConnectionSettings,
        tracker: ConnectionTracker,
    ) -> Result<Self, ReactorError> {
        let (unbind, unbind_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<io::Result<()>>(1);
        let shared = Arc::new(Shared {
            callback,
            shutdown,
            settings,
        });

        let thread = thread::Builder::new()
            .name("http".to_string())
            .spawn(move || run_reactor(listeners, shared, tracker, unbind_rx, ready_tx))
            .map_err(ReactorError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { thread, unbind }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(ReactorError::Setup(e))
            }
            Err(_) => {
                let _ = thread.join();
                Err(ReactorError::Exited)
            }
        }
    }

    /// Stop accepting and start draining connections.
    pub fn unbind(&self) {
        self.unbind.send_replace(true);
    }

    /// Unbind (if not done yet) and wait for the thread to finish.
    pub fn join(self) {
        self.unbind();
        if self.thread.join().is_err() {
            tracing::error!("HTTP event thread panicked");
        }
    }
}

fn run_reactor(
    listeners: Vec<BoundListener>,
    shared: Arc<Shared>,
    tracker: ConnectionTracker,
    mut unbind: watch::Receiver<bool>,
    ready: mpsc::SyncSender<io::Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let local = LocalSet::new();

    local.block_on(&runtime, async move {
        let mut accepting = Vec::with_capacity(listeners.len());
        for bound in listeners {
            match TcpListener::from_std(bound.inner) {
                Ok(listener) => accepting.push((bound.local_addr, listener)),
                Err(e) => {
                    let _ = ready.send(Err(e));
                    return;
                }
            }
        }

        let mut loops = Vec::with_capacity(accepting.len());
        for (addr, listener) in accepting {
            loops.push(tokio::task::spawn_local(accept_loop(
                addr,
                listener,
                Arc::clone(&shared),
                tracker.clone(),
                unbind.clone(),
            )));
        }
        tracing::debug!("Entering HTTP event loop");
        let _ = ready.send(Ok(()));

        let _ = unbind.wait_for(|unbound| *unbound).await;
        for accept in loops {
            let _ = accept.await;
        }

        let idle_timeout = shared.settings.idle_timeout;
        if !tracker.wait_idle(idle_timeout).await {
            tracing::warn!(
                open = tracker.active_count(),
                "Connections still open after {:?}; closing them",
                idle_timeout
            );
        }
        tracing::debug!("Exited HTTP event loop");
    });
}

async fn accept_loop(
    addr: SocketAddr,
    listener: TcpListener,
    shared: Arc<Shared>,
    tracker: ConnectionTracker,
    mut unbind: watch::Receiver<bool>,
) {
    tracing::info!(address = %addr, "Accepting HTTP connections");
    // `unbind` stays mutably borrowed by the select below.
    let conn_unbind = unbind.clone();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let guard = tracker.track();
                    tracing::trace!(connection_id = %guard.id(), peer = %peer, "Accepted connection");
                    tokio::task::spawn_local(serve_connection(
                        stream,
                        peer,
                        guard,
                        Arc::clone(&shared),
                        conn_unbind.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(address = %addr, error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            _ = unbind.wait_for(|unbound| *unbound) => break,
        }
    }
    tracing::debug!(address = %addr, "Unbound HTTP listener");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    shared: Arc<Shared>,
    mut unbind: watch::Receiver<bool>,
) {
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(shared.settings.idle_timeout)
        .max_buf_size(shared.settings.max_header_bytes)
        .keep_alive(true);

    let service = service_fn(move |req| handle_request(req, peer, Arc::clone(&shared)));
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                }
                break;
            }
            _ = unbind.wait_for(|unbound| *unbound), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
    drop(guard);
}

async fn handle_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    shared: Arc<Shared>,
) -> Result<HttpResponse, Infallible> {
    let (parts, body) = req.into_parts();

    let limit = usize::try_from(shared.settings.max_body_bytes).unwrap_or(usize::MAX);
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::debug!(peer = %peer, limit, "Request body exceeds size limit");
            return Ok(status_only(StatusCode::PAYLOAD_TOO_LARGE));
        }
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "Failed to read request body");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };

    let head = RequestHead::from_parts(&parts, peer);
    let (ctx, pending) = RequestContext::new(head, body, shared.shutdown.clone());
    shared.callback.load().handle(ctx);

    Ok(into_response(pending.wait().await))
}
