//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Init → Start → (signal) → Interrupt → Stop
//!
//! Shutdown (shutdown.rs):
//!     Flag raised at Interrupt → replies carry Connection: close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main runs Interrupt then Stop
//! ```
//!
//! # Design Decisions
//! - States only move forward (state.rs)
//! - Stop drains: workers joined, queued requests answered, connections
//!   closed within the idle timeout

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use state::ServerState;
