//! Path matching logic.
//!
//! # Responsibilities
//! - Match a request URI against a registered prefix
//! - Produce the sub-path left after the prefix
//!
//! # Design Decisions
//! - Matching is byte-wise and case-sensitive on the raw request target
//! - Exact entries only match the whole URI; their sub-path is empty
//! - No regex, no normalisation: what was registered is what matches

/// How a registered prefix is compared with a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// URI must equal the prefix.
    Exact,
    /// URI must start with the prefix.
    Prefix,
}

impl MatchMode {
    pub fn is_exact(&self) -> bool {
        matches!(self, MatchMode::Exact)
    }
}

impl From<bool> for MatchMode {
    /// `true` means exact match.
    fn from(exact: bool) -> Self {
        if exact {
            MatchMode::Exact
        } else {
            MatchMode::Prefix
        }
    }
}

/// A prefix and its match mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    prefix: String,
    mode: MatchMode,
}

impl PathMatcher {
    pub fn new(prefix: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            prefix: prefix.into(),
            mode,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// The sub-path if `uri` matches, otherwise `None`.
    pub fn strip<'a>(&self, uri: &'a str) -> Option<&'a str> {
        match self.mode {
            MatchMode::Exact => (uri == self.prefix).then_some(""),
            MatchMode::Prefix => uri.strip_prefix(self.prefix.as_str()),
        }
    }

    /// Whether this matcher was registered as `(prefix, mode)`.
    pub fn is(&self, prefix: &str, mode: MatchMode) -> bool {
        self.prefix == prefix && self.mode == mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matcher() {
        let matcher = PathMatcher::new("/status", MatchMode::Exact);
        assert_eq!(matcher.strip("/status"), Some(""));
        assert_eq!(matcher.strip("/status/"), None);
        assert_eq!(matcher.strip("/STATUS"), None);
    }

    #[test]
    fn prefix_matcher() {
        let matcher = PathMatcher::new("/rest/", MatchMode::Prefix);
        assert_eq!(matcher.strip("/rest/headers/5"), Some("headers/5"));
        assert_eq!(matcher.strip("/rest/"), Some(""));
        assert_eq!(matcher.strip("/rest"), None);
    }

    #[test]
    fn mode_from_flag() {
        assert_eq!(MatchMode::from(true), MatchMode::Exact);
        assert_eq!(MatchMode::from(false), MatchMode::Prefix);
    }
}
