//! Network layer.
//!
//! # Data Flow
//! ```text
//! RpcConfig (port, bind, allow_ip)
//!     → listener.rs (pick endpoints, bind sockets)
//!     → std listeners handed to the reactor thread
//!     → connection.rs (id + tracking per accepted socket)
//! ```
//!
//! # Design Decisions
//! - Binding happens during Init, on the caller's thread, so failures are
//!   reported before any thread starts
//! - Each connection is tracked so Stop can wait for it to drain

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{BoundListener, Endpoint, ListenerError};
