//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor for the request body limit, before block-size scaling.
pub const MIN_SUPPORTED_BODY_SIZE: u64 = 0x0200_0000;

/// Largest request line plus headers the transport will accept.
pub const MAX_HEADERS_SIZE: usize = 8192;

/// Root configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Endpoints, access and worker settings.
    pub rpc: RpcConfig,

    /// Transport size limits.
    pub limits: LimitsConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// RPC server settings, named after their command-line options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Port applied to endpoints that do not carry one (`-rpcport`).
    pub port: u16,

    /// Addresses to bind (`-rpcbind`). Ignored unless `allow_ip` is also set.
    pub bind: Vec<String>,

    /// Extra subnets allowed to connect (`-rpcallowip`).
    pub allow_ip: Vec<String>,

    /// Worker thread count (`-rpcthreads`). Values below 1 are raised to 1.
    pub threads: usize,

    /// Work queue depth (`-rpcworkqueue`). Values below 1 are raised to 1.
    pub work_queue: usize,

    /// Idle timeout for connections, in seconds (`-rpcservertimeout`).
    pub server_timeout_secs: u64,
}

impl RpcConfig {
    pub fn worker_threads(&self) -> usize {
        self.threads.max(1)
    }

    pub fn work_queue_depth(&self) -> usize {
        self.work_queue.max(1)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            port: 8332,
            bind: Vec::new(),
            allow_ip: Vec::new(),
            threads: 4,
            work_queue: 16,
            server_timeout_secs: 30,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes for the request line plus headers.
    pub max_header_bytes: usize,

    /// Node's excessive block size; the body limit scales with it so a
    /// full block always fits in one request.
    pub excessive_block_size: u64,
}

impl LimitsConfig {
    /// Body limit: `MIN_SUPPORTED_BODY_SIZE + 2 * excessive_block_size`.
    pub fn max_body_bytes(&self) -> u64 {
        MIN_SUPPORTED_BODY_SIZE.saturating_add(self.excessive_block_size.saturating_mul(2))
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: MAX_HEADERS_SIZE,
            excessive_block_size: 32_000_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Dump full requests and replies to the `httptrace` target.
    pub http_trace: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "rpc_httpd=info".to_string(),
            http_trace: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_node_options() {
        let config = ServerConfig::default();
        assert_eq!(config.rpc.port, 8332);
        assert_eq!(config.rpc.worker_threads(), 4);
        assert_eq!(config.rpc.work_queue_depth(), 16);
        assert_eq!(config.rpc.server_timeout(), Duration::from_secs(30));
        assert_eq!(config.limits.max_header_bytes, 8192);
        assert_eq!(config.limits.max_body_bytes(), 0x0200_0000 + 64_000_000);
    }

    #[test]
    fn zero_counts_are_raised() {
        let rpc = RpcConfig {
            threads: 0,
            work_queue: 0,
            ..RpcConfig::default()
        };
        assert_eq!(rpc.worker_threads(), 1);
        assert_eq!(rpc.work_queue_depth(), 1);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [rpc]
            work_queue = 64
            allow_ip = ["10.0.0.0/8"]

            [observability]
            http_trace = true
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.work_queue, 64);
        assert_eq!(config.rpc.threads, 4);
        assert_eq!(config.rpc.allow_ip, vec!["10.0.0.0/8".to_string()]);
        assert!(config.observability.http_trace);
        assert_eq!(config.limits.max_header_bytes, MAX_HEADERS_SIZE);
    }
}
