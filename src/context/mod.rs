//! Per-request context.
//!
//! [`Context`] carries the request identity the middleware pipeline works
//! with: method, request target (path plus optional query string), and the
//! request headers. Hosts build one per incoming request and hand it to
//! [`Next::run`](crate::middleware::Next::run).

use crate::http::{Headers, Method};

/// The per-request view a middleware receives.
///
/// Cheap to construct and to clone; the caching layer derives cache keys
/// from it without mutating it.
///
/// # Examples
///
/// ```
/// use shellac::context::Context;
/// use shellac::http::Method;
///
/// let ctx = Context::new(Method::Get, "/users?page=2")
///     .header("Accept", "application/json");
///
/// assert_eq!(ctx.method(), &Method::Get);
/// assert_eq!(ctx.url(), "/users?page=2");
/// assert_eq!(ctx.path(), "/users");
/// assert_eq!(ctx.query(), Some("page=2"));
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    method: Method,
    url: String,
    headers: Headers,
}

impl Context {
    /// Creates a context for the given method and request target.
    ///
    /// The target is kept verbatim; [`path`](Self::path) and
    /// [`query`](Self::query) split it on demand.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
        }
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full request target, query string included.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request path without the query string.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// Returns the query string after `?`, or `None` if there is none.
    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let ctx = Context::new(Method::Get, "/search?q=cache&lang=en");
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query(), Some("q=cache&lang=en"));
    }

    #[test]
    fn bare_path_has_no_query() {
        let ctx = Context::new(Method::Head, "/health");
        assert_eq!(ctx.path(), "/health");
        assert_eq!(ctx.query(), None);
        assert_eq!(ctx.url(), "/health");
    }

    #[test]
    fn carries_request_headers() {
        let ctx = Context::new(Method::Get, "/")
            .header("Authorization", "Bearer token")
            .header("Accept", "text/html");
        assert_eq!(ctx.headers().get("authorization"), Some("Bearer token"));
        assert_eq!(ctx.headers().len(), 2);
    }
}
