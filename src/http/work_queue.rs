//! Bounded work queue between the reactor and the worker pool.
//!
//! # Responsibilities
//! - Hand work items from the reactor thread to worker threads in FIFO order
//! - Refuse new items once the configured depth is reached
//! - Wake every blocked worker when the server is interrupted
//!
//! # Design Decisions
//! - `Mutex<VecDeque>` + `Condvar`: enqueue never blocks, dequeue does
//! - Overflow hands the item back to the caller (`Err(item)`), which must reply
//! - Interrupt does not drain: items still queued are released on teardown,
//!   which fires their fallback replies

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::http::handler::HttpHandler;
use crate::http::request::RequestContext;
use std::sync::Arc;

/// A queued request together with the handler that will serve it.
pub struct WorkItem {
    ctx: RequestContext,
    handler: Arc<dyn HttpHandler>,
    subpath: String,
}

impl WorkItem {
    /// Pair a request with its resolved handler and sub-path.
    pub fn new(ctx: RequestContext, handler: Arc<dyn HttpHandler>, subpath: String) -> Self {
        Self { ctx, handler, subpath }
    }

    /// The URI remainder after the matched prefix.
    pub fn subpath(&self) -> &str {
        &self.subpath
    }

    /// Run the handler, consuming the item.
    pub fn run(self) {
        self.handler.handle(self.ctx, &self.subpath);
    }

    /// Take the request back out, e.g. to reply with an overload error.
    pub fn into_context(self) -> RequestContext {
        self.ctx
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("uri", &self.ctx.uri())
            .field("subpath", &self.subpath)
            .finish()
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    running: bool,
}

/// Thread-safe FIFO with a depth ceiling.
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    cond: Condvar,
    max_depth: usize,
}

impl<T> WorkQueue<T> {
    /// Create a running queue holding at most `max_depth` items.
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(max_depth),
                running: true,
            }),
            cond: Condvar::new(),
            max_depth,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item if there is room, otherwise give it back.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.items.len() >= self.max_depth {
            return Err(item);
        }
        state.items.push_back(item);
        self.cond.notify_one();
        Ok(())
    }

    /// Block until an item is available. Returns `None` once interrupted.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        while state.running && state.items.is_empty() {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if !state.running {
            return None;
        }
        state.items.pop_front()
    }

    /// Stop the queue and wake all waiting threads. Idempotent.
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.running = false;
        self.cond.notify_all();
    }

    /// Drop every queued item, returning how many were released.
    ///
    /// Items are dropped outside the lock.
    pub fn release_pending(&self) -> usize {
        let released: Vec<T> = self.lock().items.drain(..).collect();
        released.len()
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crate::http::request::test_context;
    use hyper::StatusCode;

    #[test]
    fn enqueue_respects_ceiling() {
        let queue = WorkQueue::new(2);
        assert!(queue.enqueue(1).is_ok());
        assert!(queue.enqueue(2).is_ok());
        assert_eq!(queue.enqueue(3), Err(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn dequeue_is_fifo() {
        let queue = WorkQueue::new(8);
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        let drained: Vec<_> = (0..5).map(|_| queue.dequeue().unwrap()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn interrupt_wakes_blocked_consumer() {
        let queue = Arc::new(WorkQueue::<u32>::new(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };
        thread::sleep(Duration::from_millis(50));
        queue.interrupt();
        queue.interrupt();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(!queue.is_running());
    }

    #[test]
    fn interrupted_queue_keeps_items_for_teardown() {
        let queue = WorkQueue::new(4);
        queue.enqueue("a").unwrap();
        queue.interrupt();
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.release_pending(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn dropping_queue_releases_pending_requests() {
        let queue = WorkQueue::new(1);
        let (ctx, mut pending) = test_context("127.0.0.1:5000", "/queued");
        let handler: Arc<dyn HttpHandler> =
            Arc::new(crate::http::handler::handler_fn(|_ctx, _subpath| {}));
        queue.enqueue(WorkItem::new(ctx, handler, String::new())).unwrap();
        queue.interrupt();
        drop(queue);

        let reply = pending.try_take().expect("fallback reply");
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&reply.body[..], b"Unhandled request");
        assert!(pending.try_take().is_none());
    }
}
