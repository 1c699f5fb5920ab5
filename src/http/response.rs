//! Reply → hyper response conversion.
//!
//! # Responsibilities
//! - Turn a buffered [`Reply`] into a `hyper::Response`
//! - Produce bare status responses for transport-level rejections
//!
//! # Design Decisions
//! - Output headers a handler wrote with an invalid name or value are dropped
//!   with a warning; the reply itself still goes out
//! - Content-Length is left to hyper, which derives it from the full body

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};

use crate::http::reply::Reply;

pub type HttpResponse = Response<Full<Bytes>>;

/// Build the wire response for a handler reply.
pub fn into_response(reply: Reply) -> HttpResponse {
    let mut response = Response::new(Full::new(reply.body));
    *response.status_mut() = reply.status;

    let headers = response.headers_mut();
    for (name, value) in reply.headers {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid output header"),
        }
    }
    response
}

/// Empty-bodied response with only a status.
pub fn status_only(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
