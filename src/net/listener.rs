//! Endpoint selection and socket binding.
//!
//! # Responsibilities
//! - Decide which addresses to bind from `rpc.bind` / `rpc.allow_ip`
//! - Split `host[:port]` entries, applying the default port
//! - Bind non-blocking listening sockets for the reactor to adopt
//!
//! # Design Decisions
//! - Without both bind and allow entries, only loopback is bound: exposing
//!   the server requires opting in twice
//! - Sockets are created with `socket2` (reuse-address, v6-only) and handed
//!   over as std listeners; the reactor converts them on its own runtime
//! - A single failed endpoint is logged and skipped; the caller decides if
//!   zero bound endpoints is fatal

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use thiserror::Error;

use crate::config::RpcConfig;

const LISTEN_BACKLOG: i32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A bind entry could not be parsed.
    #[error("invalid bind address {0:?}")]
    InvalidEndpoint(String),
    /// Failed to bind to address.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },
}

/// A host and port to listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Literal host as configured; empty means all interfaces.
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn socket_addr(&self) -> std::io::Result<SocketAddr> {
        if self.host.is_empty() {
            return Ok(SocketAddr::from(([0, 0, 0, 0], self.port)));
        }
        if let Ok(ip) = self.host.parse() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "host did not resolve"))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split `host[:port]`, bracketed IPv6 included. Bare IPv6 keeps `default_port`.
pub fn split_host_port(input: &str, default_port: u16) -> Result<Endpoint, ListenerError> {
    let invalid = || ListenerError::InvalidEndpoint(input.to_string());

    if let Some(rest) = input.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => default_port,
            _ => tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?,
        };
        return Ok(Endpoint::new(host, port));
    }

    match input.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 address.
        Some((host, _)) if host.contains(':') => Ok(Endpoint::new(input, default_port)),
        Some((host, port)) => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok(Endpoint::new(host, port))
        }
        None => Ok(Endpoint::new(input, default_port)),
    }
}

/// Work out which endpoints to bind.
pub fn resolve_endpoints(config: &RpcConfig) -> Result<Vec<Endpoint>, ListenerError> {
    let has_allow = !config.allow_ip.is_empty();
    let has_bind = !config.bind.is_empty();

    if !(has_allow && has_bind) {
        if has_allow {
            tracing::warn!(
                "option -rpcallowip was specified without -rpcbind; this doesn't usually make sense"
            );
        }
        if has_bind {
            tracing::warn!(
                "option -rpcbind was ignored because -rpcallowip was not specified, \
                 refusing to allow everyone to connect"
            );
        }
        return Ok(vec![
            Endpoint::new("::1", config.port),
            Endpoint::new("127.0.0.1", config.port),
        ]);
    }

    config
        .bind
        .iter()
        .map(|entry| split_host_port(entry.trim(), config.port))
        .collect()
}

/// A bound, listening, non-blocking socket.
#[derive(Debug)]
pub struct BoundListener {
    pub endpoint: Endpoint,
    pub local_addr: SocketAddr,
    pub inner: TcpListener,
}

impl BoundListener {
    /// Bind and listen on `endpoint`.
    pub fn bind(endpoint: &Endpoint) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind {
            endpoint: endpoint.clone(),
            source,
        };

        let addr = endpoint.socket_addr().map_err(bind_err)?;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        if addr.is_ipv6() {
            socket.set_only_v6(true).map_err(bind_err)?;
        }
        socket.bind(&SockAddr::from(addr)).map_err(bind_err)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let inner: TcpListener = socket.into();
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, "Listener bound");
        Ok(Self {
            endpoint: endpoint.clone(),
            local_addr,
            inner,
        })
    }
}

/// Bind every endpoint, skipping the ones that fail.
pub fn bind_all(endpoints: &[Endpoint]) -> Vec<BoundListener> {
    endpoints
        .iter()
        .filter_map(|endpoint| {
            tracing::debug!("Binding RPC on address {} port {}", endpoint.host, endpoint.port);
            match BoundListener::bind(endpoint) {
                Ok(listener) => Some(listener),
                Err(e) => {
                    tracing::warn!(error = %e, "Binding RPC on address {} port {} failed.", endpoint.host, endpoint.port);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(bind: &[&str], allow: &[&str]) -> RpcConfig {
        RpcConfig {
            port: 8332,
            bind: bind.iter().map(|s| s.to_string()).collect(),
            allow_ip: allow.iter().map(|s| s.to_string()).collect(),
            ..RpcConfig::default()
        }
    }

    #[test]
    fn split_forms() {
        assert_eq!(split_host_port("10.0.0.1", 80).unwrap(), Endpoint::new("10.0.0.1", 80));
        assert_eq!(split_host_port("10.0.0.1:9000", 80).unwrap(), Endpoint::new("10.0.0.1", 9000));
        assert_eq!(split_host_port("[::1]:9000", 80).unwrap(), Endpoint::new("::1", 9000));
        assert_eq!(split_host_port("[::1]", 80).unwrap(), Endpoint::new("::1", 80));
        assert_eq!(split_host_port("fe80::1", 80).unwrap(), Endpoint::new("fe80::1", 80));
        assert_eq!(split_host_port("localhost:0", 80).unwrap(), Endpoint::new("localhost", 0));
        assert!(split_host_port("host:notaport", 80).is_err());
        assert!(split_host_port("[::1:80", 80).is_err());
    }

    #[test]
    fn loopback_unless_both_bind_and_allow() {
        let loopback = vec![Endpoint::new("::1", 8332), Endpoint::new("127.0.0.1", 8332)];
        assert_eq!(resolve_endpoints(&rpc(&[], &[])).unwrap(), loopback);
        assert_eq!(resolve_endpoints(&rpc(&["0.0.0.0"], &[])).unwrap(), loopback);
        assert_eq!(resolve_endpoints(&rpc(&[], &["10.0.0.0/8"])).unwrap(), loopback);
    }

    #[test]
    fn explicit_binds_with_allow() {
        let endpoints = resolve_endpoints(&rpc(&["0.0.0.0", "[::]:18332"], &["10.0.0.0/8"])).unwrap();
        assert_eq!(
            endpoints,
            vec![Endpoint::new("0.0.0.0", 8332), Endpoint::new("::", 18332)]
        );
    }

    #[test]
    fn binds_ephemeral_loopback() {
        let listener = BoundListener::bind(&Endpoint::new("127.0.0.1", 0)).unwrap();
        assert!(listener.local_addr.ip().is_loopback());
        assert_ne!(listener.local_addr.port(), 0);
    }

    #[test]
    fn bind_all_skips_failures() {
        let first = BoundListener::bind(&Endpoint::new("127.0.0.1", 0)).unwrap();
        let taken = Endpoint::new("127.0.0.1", first.local_addr.port());
        // 192.0.2.0/24 is reserved for documentation and never local.
        let bound = bind_all(&[Endpoint::new("192.0.2.1", 1), Endpoint::new("127.0.0.1", 0)]);
        assert_eq!(bound.len(), 1);
        // Still listening, so the same port cannot be taken twice.
        assert!(BoundListener::bind(&taken).is_err());
    }
}
