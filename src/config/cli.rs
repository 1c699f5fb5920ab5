//! Command-line arguments.
//!
//! Flags mirror the node's `-rpc*` options and override values from the
//! config file.

use clap::Parser;
use std::path::PathBuf;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ServerConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "rpc-httpd")]
#[command(about = "Local control-plane HTTP server", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Default port for bind entries.
    #[arg(long = "rpcport")]
    pub rpc_port: Option<u16>,

    /// Address to bind, host[:port]. Repeatable; needs --rpcallowip.
    #[arg(long = "rpcbind")]
    pub rpc_bind: Vec<String>,

    /// Subnet allowed to connect. Repeatable.
    #[arg(long = "rpcallowip")]
    pub rpc_allow_ip: Vec<String>,

    /// Number of worker threads.
    #[arg(long = "rpcthreads")]
    pub rpc_threads: Option<usize>,

    /// Depth of the work queue.
    #[arg(long = "rpcworkqueue")]
    pub rpc_work_queue: Option<usize>,

    /// Connection idle timeout in seconds.
    #[arg(long = "rpcservertimeout")]
    pub rpc_server_timeout: Option<u64>,

    /// Dump full requests and replies to the httptrace log target.
    #[arg(long)]
    pub debug_http: bool,
}

impl Cli {
    /// Load the config file (or defaults), apply flags and validate.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ServerConfig) {
        if let Some(port) = self.rpc_port {
            config.rpc.port = port;
        }
        if !self.rpc_bind.is_empty() {
            config.rpc.bind = self.rpc_bind;
        }
        if !self.rpc_allow_ip.is_empty() {
            config.rpc.allow_ip = self.rpc_allow_ip;
        }
        if let Some(threads) = self.rpc_threads {
            config.rpc.threads = threads;
        }
        if let Some(depth) = self.rpc_work_queue {
            config.rpc.work_queue = depth;
        }
        if let Some(timeout) = self.rpc_server_timeout {
            config.rpc.server_timeout_secs = timeout;
        }
        if self.debug_http {
            config.observability.http_trace = true;
        }
    }
}
