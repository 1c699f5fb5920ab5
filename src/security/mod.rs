//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (peer address against the allow list)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: a peer outside every subnet gets 403
//! - Loopback is always allowed

pub mod access_control;

pub use access_control::{AllowList, AllowListError, Subnet};
