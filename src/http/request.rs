//! Per-request state and the reply-exactly-once contract.
//!
//! # Responsibilities
//! - Expose the request line, headers, body and peer to handlers
//! - Collect output headers and the reply
//! - Guarantee every request is answered exactly once
//!
//! # Design Decisions
//! - The reply trigger is held in an `Option`; consuming it is the
//!   Pending → Replied transition, so a replied context cannot reach the
//!   transport again
//! - A second reply is a handler bug and panics with a [`DoubleReply`] payload
//! - Dropping an unanswered context replies `500 Unhandled request`

use bytes::Bytes;
use hyper::StatusCode;
use std::net::SocketAddr;

use crate::http::reply::{reply_channel, PendingReply, Reply, ReplyTrigger};
use crate::lifecycle::Shutdown;
use crate::observability::{httptrace, metrics};

/// Methods the server distinguishes. Anything else is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Head,
    Put,
    Options,
    Unknown,
}

impl RequestMethod {
    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Head => "HEAD",
            RequestMethod::Put => "PUT",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Unknown => "unknown",
        }
    }
}

impl From<&hyper::Method> for RequestMethod {
    fn from(method: &hyper::Method) -> Self {
        match *method {
            hyper::Method::GET => RequestMethod::Get,
            hyper::Method::POST => RequestMethod::Post,
            hyper::Method::HEAD => RequestMethod::Head,
            hyper::Method::PUT => RequestMethod::Put,
            hyper::Method::OPTIONS => RequestMethod::Options,
            _ => RequestMethod::Unknown,
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request has been answered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    Replied,
}

/// Panic payload raised by a second `write_reply` on the same request.
#[derive(Debug, Clone)]
pub struct DoubleReply {
    pub uri: String,
}

/// Everything the transport parsed before the body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub peer: SocketAddr,
    pub method: RequestMethod,
    /// Request target as sent: path plus query.
    pub uri: String,
    /// Input headers in arrival order, duplicates kept.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Extract the head from a hyper request.
    pub fn from_parts(parts: &hyper::http::request::Parts, peer: SocketAddr) -> Self {
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.to_string());
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self {
            peer,
            method: RequestMethod::from(&parts.method),
            uri,
            headers,
        }
    }
}

/// One in-flight request.
///
/// Moves reactor → queue → worker; the reply goes back to the reactor through
/// the trigger.
pub struct RequestContext {
    head: RequestHead,
    body: Bytes,
    output_headers: Vec<(String, String)>,
    trigger: Option<ReplyTrigger>,
    shutdown: Shutdown,
}

impl RequestContext {
    /// Create a context and the pending reply the connection will await.
    pub fn new(head: RequestHead, body: Bytes, shutdown: Shutdown) -> (Self, PendingReply) {
        let (trigger, pending) = reply_channel();
        let ctx = Self {
            head,
            body,
            output_headers: Vec::new(),
            trigger: Some(trigger),
            shutdown,
        };
        (ctx, pending)
    }

    pub fn peer(&self) -> SocketAddr {
        self.head.peer
    }

    pub fn method(&self) -> RequestMethod {
        self.head.method
    }

    pub fn uri(&self) -> &str {
        &self.head.uri
    }

    /// First input header with this name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn input_headers(&self) -> &[(String, String)] {
        &self.head.headers
    }

    pub fn output_headers(&self) -> &[(String, String)] {
        &self.output_headers
    }

    /// Return the body. With `drain` the body is consumed and later reads are empty.
    pub fn read_body(&mut self, drain: bool) -> Bytes {
        if drain {
            std::mem::take(&mut self.body)
        } else {
            self.body.clone()
        }
    }

    /// Append an output header.
    pub fn write_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.output_headers.push((name.into(), value.into()));
    }

    pub fn reply_state(&self) -> ReplyState {
        if self.trigger.is_some() {
            ReplyState::Pending
        } else {
            ReplyState::Replied
        }
    }

    /// Send the reply. May be called from any thread, exactly once.
    ///
    /// # Panics
    ///
    /// Panics with a [`DoubleReply`] payload if the request was already answered.
    pub fn write_reply(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        let Some(trigger) = self.trigger.take() else {
            tracing::error!(uri = %self.head.uri, peer = %self.head.peer, "Reply already sent for request");
            std::panic::panic_any(DoubleReply {
                uri: self.head.uri.clone(),
            });
        };

        if self.shutdown.is_requested() {
            self.write_header("Connection", "close");
        }

        let body = body.into();
        httptrace::trace_reply(self.head.peer, status, &self.output_headers, &body);
        metrics::record_request(self.head.method.as_str(), status.as_u16());

        let reply = Reply {
            status,
            headers: std::mem::take(&mut self.output_headers),
            body,
        };
        if trigger.fire(reply).is_err() {
            tracing::debug!(
                uri = %self.head.uri,
                peer = %self.head.peer,
                "Connection closed before reply could be sent"
            );
        }
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if self.trigger.is_some() {
            tracing::warn!(uri = %self.head.uri, peer = %self.head.peer, "Unhandled request");
            metrics::record_unhandled_request();
            self.write_reply(StatusCode::INTERNAL_SERVER_ERROR, "Unhandled request");
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("peer", &self.head.peer)
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("state", &self.reply_state())
            .finish()
    }
}

/// Build a GET context for unit tests.
#[cfg(test)]
pub(crate) fn test_context(peer: &str, uri: &str) -> (RequestContext, PendingReply) {
    let head = RequestHead {
        peer: peer.parse().expect("test peer"),
        method: RequestMethod::Get,
        uri: uri.to_string(),
        headers: Vec::new(),
    };
    RequestContext::new(head, Bytes::new(), Shutdown::new())
}
