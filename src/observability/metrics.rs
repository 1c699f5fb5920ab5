//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, queue pressure, connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rpc_http_requests_total` (counter): replies by method, status
//! - `rpc_http_unhandled_requests_total` (counter): fallback 500 replies
//! - `rpc_http_work_queue_rejected_total` (counter): overload rejections
//! - `rpc_http_work_queue_depth` (gauge): items waiting for a worker
//! - `rpc_http_active_connections` (gauge): open client connections
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The exporter is optional and listens on its own address

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &'static str, status: u16) {
    metrics::counter!(
        "rpc_http_requests_total",
        "method" => method,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_unhandled_request() {
    metrics::counter!("rpc_http_unhandled_requests_total").increment(1);
}

pub fn record_queue_rejected() {
    metrics::counter!("rpc_http_work_queue_rejected_total").increment(1);
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!("rpc_http_work_queue_depth").set(depth as f64);
}

pub fn record_active_connections(count: u64) {
    metrics::gauge!("rpc_http_active_connections").set(count as f64);
}
