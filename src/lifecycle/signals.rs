//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM
//! - Hand control back to `main`, which runs Interrupt then Stop
//! - On Unix, flip httptrace logging on each SIGUSR1

use crate::observability::logging::LogHandle;

/// Resolve when the process is asked to terminate.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Toggle httptrace logging on every SIGUSR1. Runs until the task is dropped.
#[cfg(unix)]
pub async fn toggle_http_trace_on_sigusr1(logging: LogHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigusr1 = match signal(SignalKind::user_defined1()) {
        Ok(sigusr1) => sigusr1,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGUSR1 handler");
            return;
        }
    };
    while sigusr1.recv().await.is_some() {
        let enabled = !logging.http_trace();
        if let Err(e) = logging.set_http_trace(enabled) {
            tracing::warn!(error = %e, "Failed to update HTTP trace logging");
        }
    }
}

/// Runtime toggling needs SIGUSR1; elsewhere the startup setting stays.
#[cfg(not(unix))]
pub async fn toggle_http_trace_on_sigusr1(_logging: LogHandle) {}
