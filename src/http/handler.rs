//! Handler capability.

use crate::http::request::RequestContext;

/// Serves one request on a worker thread.
///
/// Implementations own the context and must answer it, either directly or by
/// letting it drop (which replies 500). Blocking is fine: only the calling
/// worker waits.
pub trait HttpHandler: Send + Sync {
    fn handle(&self, ctx: RequestContext, subpath: &str);
}

/// Handler backed by a closure. See [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Adapt a closure into an [`HttpHandler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestContext, &str) + Send + Sync,
{
    HandlerFn { f }
}

impl<F> HttpHandler for HandlerFn<F>
where
    F: Fn(RequestContext, &str) + Send + Sync,
{
    fn handle(&self, ctx: RequestContext, subpath: &str) {
        (self.f)(ctx, subpath)
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerFn")
    }
}
