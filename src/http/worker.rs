//! Worker thread pool.
//!
//! # Responsibilities
//! - Run N named threads draining the work queue
//! - Invoke handlers synchronously, isolating slow work from the reactor
//! - Exit cleanly once the queue is interrupted
//!
//! # Design Decisions
//! - A handler panic is caught; unwinding drops the request, which replies
//!   500, and the worker keeps serving
//! - A double reply is the exception: it aborts the process
//! - Threads are joined, never detached

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::http::request::DoubleReply;
use crate::http::work_queue::{WorkItem, WorkQueue};
use crate::observability::metrics;

/// Fixed set of worker threads bound to one queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers named `httpworker.{i}`.
    ///
    /// On a spawn failure the queue is interrupted and the workers already
    /// started are joined before the error is returned.
    pub fn spawn(queue: &Arc<WorkQueue<WorkItem>>, threads: usize) -> std::io::Result<Self> {
        let mut workers = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let worker_queue = Arc::clone(queue);
            let handle = thread::Builder::new()
                .name(format!("httpworker.{worker_id}"))
                .spawn(move || run_worker(&worker_queue, worker_id));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Failed to spawn HTTP worker thread");
                    queue.interrupt();
                    Self { workers }.join();
                    return Err(e);
                }
            }
        }
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit. The queue must be interrupted first.
    pub fn join(self) {
        for handle in self.workers {
            let name = handle.thread().name().unwrap_or("httpworker").to_string();
            if handle.join().is_err() {
                tracing::error!(worker = %name, "Worker thread panicked");
            }
        }
    }
}

fn run_worker(queue: &WorkQueue<WorkItem>, worker_id: usize) {
    tracing::debug!(worker_id, "Worker started");
    while let Some(item) = queue.dequeue() {
        metrics::record_queue_depth(queue.len());
        let subpath = item.subpath().to_string();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| item.run())) {
            if payload.is::<DoubleReply>() {
                tracing::error!(worker_id, subpath = %subpath, "Handler replied twice; aborting");
                std::process::abort();
            }
            tracing::error!(
                worker_id,
                subpath = %subpath,
                panic = %panic_message(payload.as_ref()),
                "Handler panicked"
            );
        }
    }
    tracing::debug!(worker_id, "Worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{handler_fn, HttpHandler};
    use crate::http::request::{test_context, RequestContext};
    use hyper::StatusCode;

    fn item(uri: &str, handler: Arc<dyn HttpHandler>) -> (WorkItem, crate::http::reply::PendingReply) {
        let (ctx, pending) = test_context("127.0.0.1:1000", uri);
        (WorkItem::new(ctx, handler, String::new()), pending)
    }

    #[test]
    fn workers_serve_and_exit() {
        let queue = Arc::new(WorkQueue::new(8));
        let pool = WorkerPool::spawn(&queue, 2).unwrap();
        assert_eq!(pool.len(), 2);

        let ok: Arc<dyn HttpHandler> = Arc::new(handler_fn(|mut ctx: RequestContext, _: &str| {
            ctx.write_reply(StatusCode::OK, "done");
        }));
        let mut pendings = Vec::new();
        for _ in 0..4 {
            let (work, pending) = item("/", Arc::clone(&ok));
            queue.enqueue(work).unwrap();
            pendings.push(pending);
        }

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        for pending in pendings {
            let reply = rt.block_on(pending.wait());
            assert_eq!(reply.status, StatusCode::OK);
        }

        queue.interrupt();
        pool.join();
    }

    #[test]
    fn panicking_handler_gets_fallback_and_worker_survives() {
        let queue = Arc::new(WorkQueue::new(8));
        let pool = WorkerPool::spawn(&queue, 1).unwrap();

        let boom: Arc<dyn HttpHandler> = Arc::new(handler_fn(|_ctx: RequestContext, _: &str| {
            panic!("handler bug");
        }));
        let ok: Arc<dyn HttpHandler> = Arc::new(handler_fn(|mut ctx: RequestContext, _: &str| {
            ctx.write_reply(StatusCode::OK, "after");
        }));

        let (first, first_pending) = item("/boom", boom);
        let (second, second_pending) = item("/ok", ok);
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fallback = rt.block_on(first_pending.wait());
        assert_eq!(fallback.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&fallback.body[..], b"Unhandled request");
        assert_eq!(rt.block_on(second_pending.wait()).status, StatusCode::OK);

        queue.interrupt();
        pool.join();
    }

    #[test]
    fn panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
