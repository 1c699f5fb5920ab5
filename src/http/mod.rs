//! HTTP request-serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (reactor.rs, thread `http`)
//!     → request.rs (RequestContext: head, body, reply trigger)
//!     → dispatcher.rs (allow list 403, method 400, route 404)
//!     → work_queue.rs (bounded FIFO; full → 500)
//!     → worker.rs (thread `httpworker.N` runs the handler)
//!     → reply.rs (one-shot back to the connection future)
//!     → response.rs (hyper response)
//!     → Send to client
//! ```
//!
//! server.rs ties it together behind Init / Start / Interrupt / Stop.

pub mod dispatcher;
pub mod handler;
pub mod reactor;
pub mod reply;
pub mod request;
pub mod response;
pub mod server;
pub mod work_queue;
pub mod worker;

pub use dispatcher::{Dispatcher, RequestCallback};
pub use handler::{handler_fn, HttpHandler};
pub use reply::{PendingReply, Reply};
pub use request::{ReplyState, RequestContext, RequestHead, RequestMethod};
pub use server::{HttpServer, ServerError};
pub use work_queue::{WorkItem, WorkQueue};
