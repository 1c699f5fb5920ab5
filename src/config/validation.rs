//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check allow entries and bind entries parse
//! - Validate value ranges (timeouts > 0, header limit within transport bounds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ServerConfig, MAX_HEADERS_SIZE};
use crate::net::listener::split_host_port;
use crate::security::access_control::Subnet;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rpc.allow_ip entry {0:?} is not a single IP, network/netmask or network/CIDR")]
    InvalidAllowIp(String),

    #[error("rpc.bind entry {0:?} is not a valid host[:port]")]
    InvalidBind(String),

    #[error("rpc.server_timeout_secs must be greater than zero")]
    ZeroServerTimeout,

    #[error("limits.max_header_bytes must be at least {min}, got {actual}")]
    HeaderLimitTooSmall { min: usize, actual: usize },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Render a list of problems on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for entry in &config.rpc.allow_ip {
        if entry.trim().parse::<Subnet>().is_err() {
            errors.push(ValidationError::InvalidAllowIp(entry.clone()));
        }
    }

    for entry in &config.rpc.bind {
        if split_host_port(entry.trim(), config.rpc.port).is_err() {
            errors.push(ValidationError::InvalidBind(entry.clone()));
        }
    }

    if config.rpc.server_timeout_secs == 0 {
        errors.push(ValidationError::ZeroServerTimeout);
    }

    if config.limits.max_header_bytes < MAX_HEADERS_SIZE {
        errors.push(ValidationError::HeaderLimitTooSmall {
            min: MAX_HEADERS_SIZE,
            actual: config.limits.max_header_bytes,
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.rpc.allow_ip = vec!["10.0.0.0/8".into(), "bogus".into()];
        config.rpc.bind = vec!["127.0.0.1:port".into()];
        config.rpc.server_timeout_secs = 0;
        config.limits.max_header_bytes = 1024;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidAllowIp("bogus".into()),
                ValidationError::InvalidBind("127.0.0.1:port".into()),
                ValidationError::ZeroServerTimeout,
                ValidationError::HeaderLimitTooSmall { min: 8192, actual: 1024 },
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("nowhere".into())]
        );
    }
}
