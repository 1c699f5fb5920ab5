//! Request dispatch on the reactor thread.
//!
//! # Responsibilities
//! - Reject peers outside the allow list (403)
//! - Reject unknown methods (400)
//! - Resolve a handler (404 when none matches)
//! - Queue the request for a worker, or reply 500 when the queue is full
//!
//! # Design Decisions
//! - Every gate replies synchronously and never blocks: rejections are
//!   buffered replies, the queue push is non-blocking
//! - After Interrupt the active callback is swapped to [`RequestCallback::Reject`];
//!   the swap also drops the dispatcher's handle on the work queue

use arc_swap::ArcSwap;
use hyper::StatusCode;
use std::sync::Arc;

use crate::http::request::{RequestContext, RequestMethod};
use crate::http::work_queue::{WorkItem, WorkQueue};
use crate::observability::{httptrace, metrics};
use crate::routing::PathHandlerTable;
use crate::security::AllowList;

/// Characters kept when logging a URI.
const SAFE_CHARS_URI: &str = "!*'();:@&=+$,/?#[]-_.~%";

/// Longest URI prefix written to the request log.
const MAX_LOGGED_URI: usize = 100;

/// Gatekeeper between the transport and the work queue.
pub struct Dispatcher {
    allow_list: AllowList,
    handlers: Arc<ArcSwap<PathHandlerTable>>,
    queue: Arc<WorkQueue<WorkItem>>,
}

impl Dispatcher {
    pub fn new(
        allow_list: AllowList,
        handlers: Arc<ArcSwap<PathHandlerTable>>,
        queue: Arc<WorkQueue<WorkItem>>,
    ) -> Self {
        Self {
            allow_list,
            handlers,
            queue,
        }
    }

    /// Take ownership of a request: reply now, or queue it.
    pub fn dispatch(&self, mut ctx: RequestContext) {
        let peer = ctx.peer();
        let body = ctx.read_body(false);
        httptrace::trace_request(peer, ctx.method().as_str(), ctx.uri(), ctx.input_headers(), &body);

        if !self.allow_list.is_allowed(peer.ip()) {
            tracing::debug!(
                "HTTP request from {} rejected: Client network is not allowed RPC access",
                peer
            );
            ctx.write_reply(StatusCode::FORBIDDEN, "");
            return;
        }

        let method = ctx.method();
        if method == RequestMethod::Unknown {
            tracing::debug!("HTTP request from {} rejected: Unknown HTTP request method", peer);
            ctx.write_reply(StatusCode::BAD_REQUEST, "");
            return;
        }

        tracing::debug!(
            "Received a {} request for {} from {}",
            method,
            sanitize_uri(ctx.uri()),
            peer
        );

        let Some(route) = self.handlers.load().resolve(ctx.uri()) else {
            ctx.write_reply(StatusCode::NOT_FOUND, "");
            return;
        };

        match self.queue.enqueue(WorkItem::new(ctx, route.handler, route.subpath)) {
            Ok(()) => metrics::record_queue_depth(self.queue.len()),
            Err(item) => {
                tracing::warn!(
                    "request rejected because http work queue depth exceeded, \
                     it can be increased with the -rpcworkqueue= setting"
                );
                metrics::record_queue_rejected();
                item.into_context()
                    .write_reply(StatusCode::INTERNAL_SERVER_ERROR, "Work queue depth exceeded");
            }
        }
    }
}

/// The function the transport invokes for every parsed request.
pub enum RequestCallback {
    /// Normal operation.
    Dispatch(Dispatcher),
    /// Shutting down: everything gets 503.
    Reject,
}

impl RequestCallback {
    pub fn handle(&self, mut ctx: RequestContext) {
        match self {
            RequestCallback::Dispatch(dispatcher) => dispatcher.dispatch(ctx),
            RequestCallback::Reject => {
                tracing::debug!("Rejecting request while shutting down");
                ctx.write_reply(StatusCode::SERVICE_UNAVAILABLE, "");
            }
        }
    }
}

/// Keep URI-safe characters and cap the length, for logging only.
fn sanitize_uri(uri: &str) -> String {
    uri.chars()
        .filter(|c| c.is_ascii_alphanumeric() || SAFE_CHARS_URI.contains(*c))
        .take(MAX_LOGGED_URI)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::http::reply::PendingReply;
    use crate::http::request::{test_context, RequestHead};
    use crate::lifecycle::Shutdown;
    use crate::routing::MatchMode;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        dispatcher: Dispatcher,
        queue: Arc<WorkQueue<WorkItem>>,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(depth: usize) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = PathHandlerTable::new();
        let counter = Arc::clone(&calls);
        table.register(
            "/",
            MatchMode::Exact,
            Arc::new(handler_fn(move |mut ctx: RequestContext, _: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.write_reply(StatusCode::OK, "ok");
            })),
        );
        let queue = Arc::new(WorkQueue::new(depth));
        let dispatcher = Dispatcher::new(
            AllowList::default(),
            Arc::new(ArcSwap::from_pointee(table)),
            Arc::clone(&queue),
        );
        Fixture {
            dispatcher,
            queue,
            calls,
        }
    }

    fn status_of(pending: &mut PendingReply) -> Option<StatusCode> {
        pending.try_take().map(|reply| reply.status)
    }

    #[test]
    fn foreign_peer_is_forbidden() {
        let f = fixture(4);
        let (ctx, mut pending) = test_context("10.0.0.5:40000", "/");
        f.dispatcher.dispatch(ctx);

        assert_eq!(status_of(&mut pending), Some(StatusCode::FORBIDDEN));
        assert!(f.queue.is_empty());
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_method_is_bad_request() {
        let f = fixture(4);
        let head = RequestHead {
            peer: "127.0.0.1:40000".parse().unwrap(),
            method: RequestMethod::Unknown,
            uri: "/".into(),
            headers: Vec::new(),
        };
        let (ctx, mut pending) = RequestContext::new(head, Bytes::new(), Shutdown::new());
        f.dispatcher.dispatch(ctx);

        assert_eq!(status_of(&mut pending), Some(StatusCode::BAD_REQUEST));
        assert!(f.queue.is_empty());
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let f = fixture(4);
        let (ctx, mut pending) = test_context("127.0.0.1:40000", "/unknown");
        f.dispatcher.dispatch(ctx);
        assert_eq!(status_of(&mut pending), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn overflow_then_drain_then_accept() {
        let f = fixture(1);

        let (first, mut first_reply) = test_context("127.0.0.1:40001", "/");
        f.dispatcher.dispatch(first);
        assert_eq!(f.queue.len(), 1);
        assert!(first_reply.try_take().is_none());

        let (second, mut second_reply) = test_context("127.0.0.1:40002", "/");
        f.dispatcher.dispatch(second);
        let rejected = second_reply.try_take().unwrap();
        assert_eq!(rejected.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&rejected.body[..], b"Work queue depth exceeded");
        assert_eq!(f.queue.len(), 1);

        // A worker drains the first request.
        f.queue.dequeue().unwrap().run();
        assert_eq!(status_of(&mut first_reply), Some(StatusCode::OK));

        let (third, mut third_reply) = test_context("127.0.0.1:40003", "/");
        f.dispatcher.dispatch(third);
        assert_eq!(f.queue.len(), 1);
        assert!(third_reply.try_take().is_none());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reject_callback_answers_unavailable() {
        let (ctx, mut pending) = test_context("127.0.0.1:40000", "/");
        RequestCallback::Reject.handle(ctx);
        assert_eq!(status_of(&mut pending), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn uri_sanitized_for_logging() {
        assert_eq!(sanitize_uri("/rest/tx/ab?x=1"), "/rest/tx/ab?x=1");
        assert_eq!(sanitize_uri("/a b\n<c>"), "/abc");
        assert_eq!(sanitize_uri(&"a".repeat(300)).len(), 100);
    }
}
