//! Local control-plane HTTP server core.
//!
//! One reactor thread owns every socket; a fixed pool of workers runs the
//! registered handlers. See [`http`] for the request path and
//! [`HttpServer`] for the lifecycle.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::ServerConfig;
pub use http::{handler_fn, HttpHandler, HttpServer, RequestContext, ServerError};
pub use lifecycle::{ServerState, Shutdown};
pub use routing::MatchMode;
