//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Merge `RUST_LOG` with configured defaults
//! - Switch the `httptrace` target on or off, at startup or while running
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Thread names are printed: `http` is the reactor, `httpworker.N` the pool
//! - `RUST_LOG` wins over the config file's `log_filter`
//! - The filter sits behind a `reload` layer; toggling httptrace rebuilds it
//!   from the same base directives

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::ObservabilityConfig;
use crate::observability::httptrace::HTTPTRACE_DIRECTIVE;

/// Base directives: `RUST_LOG` if set, otherwise the configured filter.
fn base_directives(config: &ObservabilityConfig) -> String {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_filter.clone())
}

fn compose_filter(directives: &str, http_trace: bool) -> EnvFilter {
    let filter = EnvFilter::new(directives);
    if !http_trace {
        return filter;
    }
    match HTTPTRACE_DIRECTIVE.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Runtime control over the installed filter.
#[derive(Clone)]
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, Registry>,
    directives: Arc<str>,
    http_trace: Arc<AtomicBool>,
}

impl LogHandle {
    fn new(reload: reload::Handle<EnvFilter, Registry>, directives: &str, http_trace: bool) -> Self {
        Self {
            reload,
            directives: Arc::from(directives),
            http_trace: Arc::new(AtomicBool::new(http_trace)),
        }
    }

    /// Turn full request/reply dumps on or off.
    pub fn set_http_trace(&self, enabled: bool) -> Result<(), reload::Error> {
        self.reload.reload(compose_filter(&self.directives, enabled))?;
        self.http_trace.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "HTTP trace logging updated");
        Ok(())
    }

    pub fn http_trace(&self) -> bool {
        self.http_trace.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle")
            .field("directives", &self.directives)
            .field("http_trace", &self.http_trace())
            .finish()
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: &ObservabilityConfig) -> LogHandle {
    let directives = base_directives(config);
    let (filter, reload) = reload::Layer::new(compose_filter(&directives, config.http_trace));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();
    LogHandle::new(reload, &directives, config.http_trace)
}
