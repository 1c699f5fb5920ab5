//! Path handler table.
//!
//! # Responsibilities
//! - Store handlers in registration order
//! - Resolve a URI to its handler and sub-path
//! - Support unregistering by `(prefix, mode)`
//!
//! # Design Decisions
//! - First match wins; no longest-prefix or priority ordering
//! - O(n) scan per request (handler sets are small and static)
//! - Cheap to clone (handlers are `Arc`), so the server can publish a new
//!   table atomically instead of locking it

use std::sync::Arc;

use crate::http::handler::HttpHandler;
use crate::routing::matcher::{MatchMode, PathMatcher};

/// A resolved route.
#[derive(Clone)]
pub struct Route {
    pub handler: Arc<dyn HttpHandler>,
    pub subpath: String,
}

#[derive(Clone)]
struct PathHandlerEntry {
    matcher: PathMatcher,
    handler: Arc<dyn HttpHandler>,
}

/// Ordered `(prefix, mode, handler)` table.
#[derive(Clone, Default)]
pub struct PathHandlerTable {
    entries: Vec<PathHandlerEntry>,
}

impl PathHandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn register(&mut self, prefix: impl Into<String>, mode: MatchMode, handler: Arc<dyn HttpHandler>) {
        let matcher = PathMatcher::new(prefix, mode);
        tracing::debug!(
            "Registering HTTP handler for {} (exactmatch {})",
            matcher.prefix(),
            mode.is_exact()
        );
        self.entries.push(PathHandlerEntry { matcher, handler });
    }

    /// Remove the first entry registered as `(prefix, mode)`.
    ///
    /// Returns `false` if there was none.
    pub fn unregister(&mut self, prefix: &str, mode: MatchMode) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.matcher.is(prefix, mode)) else {
            return false;
        };
        tracing::debug!(
            "Unregistering HTTP handler for {} (exactmatch {})",
            prefix,
            mode.is_exact()
        );
        self.entries.remove(pos);
        true
    }

    /// Find the first entry matching `uri`.
    pub fn resolve(&self, uri: &str) -> Option<Route> {
        self.entries.iter().find_map(|entry| {
            entry.matcher.strip(uri).map(|subpath| Route {
                handler: Arc::clone(&entry.handler),
                subpath: subpath.to_string(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PathHandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.matcher))
            .finish()
    }
}
