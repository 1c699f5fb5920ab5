//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!     → httptrace.rs (full request/reply dumps, TRACE only)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Log level configurable via config and `RUST_LOG`
//! - Metrics are cheap (atomic increments)
//! - httptrace output is never formatted unless its target is enabled

pub mod httptrace;
pub mod logging;
pub mod metrics;
