//! Full request/reply dumps for debugging.
//!
//! Logged at TRACE on the `httptrace` target and only formatted when that
//! target is enabled. Nothing is sanitized here: this is a debugging aid, not
//! an access log.

use bytes::Bytes;
use hyper::StatusCode;
use std::fmt::Write as _;
use std::net::SocketAddr;

/// Filter directive that enables the dumps.
pub const HTTPTRACE_DIRECTIVE: &str = "httptrace=trace";

fn enabled() -> bool {
    tracing::enabled!(target: "httptrace", tracing::Level::TRACE)
}

fn join_headers(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Log an incoming request.
pub fn trace_request(
    peer: SocketAddr,
    method: &str,
    uri: &str,
    headers: &[(String, String)],
    body: &Bytes,
) {
    if !enabled() {
        return;
    }
    tracing::trace!(
        target: "httptrace",
        "Request from {}, method: \"{}\", URI: \"{}\", headers: {}, content: {} bytes\n\
         --- HEADERS ---\n{}\n--- CONTENT ---\n{}",
        peer,
        method,
        uri,
        headers.len(),
        body.len(),
        join_headers(headers),
        String::from_utf8_lossy(body),
    );
}

/// Log an outgoing reply. Binary bodies are hex encoded.
pub fn trace_reply(peer: SocketAddr, status: StatusCode, headers: &[(String, String)], body: &Bytes) {
    if !enabled() {
        return;
    }
    let binary = headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case("Content-Type") && value == "application/octet-stream"
    });
    let (desc, content) = if binary {
        (" (binary data, hex encoded)", to_hex(body))
    } else {
        ("", String::from_utf8_lossy(body).into_owned())
    };
    tracing::trace!(
        target: "httptrace",
        "Writing reply to {}, status: {}, headers: {}, content: {} bytes\n\
         --- HEADERS ---\n{}\n--- CONTENT{} ---\n{}",
        peer,
        status.as_u16(),
        headers.len(),
        body.len(),
        join_headers(headers),
        desc,
        content,
    );
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
