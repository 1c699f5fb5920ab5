//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request URI (path + query, as sent)
//!     → router.rs (scan entries in registration order)
//!     → matcher.rs (exact or prefix comparison)
//!     → Return: handler + sub-path, or no match (404)
//!
//! Registration (before Start):
//!     register(prefix, mode, handler)
//!     → clone table, append, publish via ArcSwap
//! ```
//!
//! # Design Decisions
//! - First match wins, in registration order
//! - Dispatcher reads an immutable snapshot; no lock on the hot path

pub mod matcher;
pub mod router;

pub use matcher::{MatchMode, PathMatcher};
pub use router::{PathHandlerTable, Route};
