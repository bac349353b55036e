//! Proxy prefix matching.
//!
//! # Responsibilities
//! - Decide whether a request path is marked for forwarding
//! - Return the remainder after the prefix
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Segment-aware: `/api/proxy` matches `/api/proxy` and `/api/proxy/...`,
//!   never `/api/proxyfoo`
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::Request;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// The literal path prefix that marks a request for forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPrefix {
    prefix: String,
}

impl ProxyPrefix {
    /// Create a prefix matcher. A trailing slash is ignored, so `/api/proxy`
    /// and `/api/proxy/` behave the same.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Strip the prefix from `path`, returning the remainder (possibly empty).
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl Matcher for ProxyPrefix {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.strip(req.uri().path()).is_some()
    }
}
