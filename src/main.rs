//! rpc-httpd: the node's local control-plane HTTP server.
//!
//! ```text
//!   client ──▶ reactor (thread `http`) ──▶ dispatcher ──▶ work queue
//!                  ▲                                         │
//!                  │                                         ▼
//!                  └──────── reply trigger ◀──── workers (`httpworker.N`)
//! ```

use clap::Parser;
use hyper::StatusCode;

use rpc_httpd::config::cli::Cli;
use rpc_httpd::lifecycle::signals::{toggle_http_trace_on_sigusr1, wait_for_signal};
use rpc_httpd::observability::{logging, metrics};
use rpc_httpd::{handler_fn, HttpServer, MatchMode, RequestContext};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    let log_handle = logging::init_logging(&config.observability);
    tokio::spawn(toggle_http_trace_on_sigusr1(log_handle));

    tracing::info!("rpc-httpd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.rpc.port,
        threads = config.rpc.worker_threads(),
        work_queue = config.rpc.work_queue_depth(),
        server_timeout_secs = config.rpc.server_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation has already checked the address.
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(error = %e, "Failed to parse metrics address"),
        }
    }

    let mut server = HttpServer::new(config);
    server.register_handler(
        "/status",
        MatchMode::Exact,
        handler_fn(|mut ctx: RequestContext, _: &str| {
            ctx.write_header("Content-Type", "text/plain");
            ctx.write_reply(StatusCode::OK, "OK");
        }),
    );

    server.init()?;
    server.start()?;
    for addr in server.local_addrs() {
        tracing::info!(address = %addr, "Listening for connections");
    }

    wait_for_signal().await;

    server.interrupt()?;
    tokio::task::spawn_blocking(move || server.stop()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
