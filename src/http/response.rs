//! HTTP response builder.
//!
//! Provides a fluent builder API for constructing responses, plus the
//! buffered/streamed body split the caching layer relies on: only fully
//! buffered bodies can be snapshotted into the cache.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

use super::{Headers, StatusCode};

/// A response body.
///
/// `Full` bodies are replayable byte buffers. `Stream` bodies arrive as a
/// channel of chunks and can only be consumed once, which is why streamed
/// responses are never cached or shared between coalesced requests.
#[derive(Debug)]
pub enum Body {
    /// A complete, replayable body.
    Full(Bytes),
    /// A single-consumption sequence of chunks.
    Stream(mpsc::Receiver<Bytes>),
}

impl Default for Body {
    fn default() -> Self {
        Self::Full(Bytes::new())
    }
}

/// An HTTP response.
///
/// # Examples
///
/// ```
/// use shellac::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Cache-Control", "public, max-age=60")
///     .body(r#"{"status":"ok"}"#);
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.headers().get("cache-control"), Some("public, max-age=60"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::default(),
        }
    }

    /// Reassembles a response from previously captured parts.
    pub fn from_parts(status: StatusCode, headers: Headers, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place. Intended for middleware pipelines that receive
    /// a `Response` from downstream and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Full(Bytes::from(body.into().into_bytes()));
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Sets the response body to a stream of chunks.
    ///
    /// The sending half feeds the body; dropping it ends the stream.
    #[must_use]
    pub fn stream(mut self, chunks: mpsc::Receiver<Bytes>) -> Self {
        self.body = Body::Stream(chunks);
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// Sets `Content-Type: application/json` unless a content type was
    /// already provided.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        if !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "application/json");
        }
        self.body = Body::Full(Bytes::from(body));
        Ok(self)
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the buffered body, or `None` for streamed bodies.
    pub fn payload(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Returns `true` if the body is a single-consumption stream.
    pub fn is_stream(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Decomposes the response for transmission.
    pub fn into_parts(self) -> (StatusCode, Headers, Body) {
        (self.status, self.headers, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Greeting {
        message: &'static str,
    }

    #[test]
    fn builder_sets_status_and_headers() {
        let r = Response::new(StatusCode::NotFound)
            .header("X-Request-Id", "abc-123")
            .body("missing");
        assert_eq!(r.status(), StatusCode::NotFound);
        assert_eq!(r.headers().get("x-request-id"), Some("abc-123"));
        assert_eq!(r.payload().map(|b| &b[..]), Some(&b"missing"[..]));
    }

    #[test]
    fn body_bytes_accepts_raw_buffers() {
        let r = Response::new(StatusCode::Ok).body_bytes(Bytes::from_static(b"\x00\x01\x02"));
        assert_eq!(r.payload().map(|b| &b[..]), Some(&b"\x00\x01\x02"[..]));
    }

    #[test]
    fn json_sets_content_type() {
        let r = Response::new(StatusCode::Ok)
            .json(&Greeting { message: "hi" })
            .unwrap();
        assert_eq!(r.headers().get("content-type"), Some("application/json"));
        assert_eq!(r.payload().map(|b| &b[..]), Some(&br#"{"message":"hi"}"#[..]));
    }

    #[test]
    fn json_keeps_explicit_content_type() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Type", "application/problem+json")
            .json(&Greeting { message: "hi" })
            .unwrap();
        assert_eq!(
            r.headers().get("content-type"),
            Some("application/problem+json")
        );
    }

    #[test]
    fn default_is_empty_ok() {
        let r = Response::default();
        assert_eq!(r.status(), StatusCode::Ok);
        assert_eq!(r.payload().map(|b| b.len()), Some(0));
        assert!(!r.is_stream());
    }

    #[tokio::test]
    async fn streamed_body_has_no_payload() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Bytes::from_static(b"chunk-1")).await.unwrap();
        tx.send(Bytes::from_static(b"chunk-2")).await.unwrap();
        drop(tx);

        let r = Response::new(StatusCode::Ok).stream(rx);
        assert!(r.is_stream());
        assert!(r.payload().is_none());

        let (_, _, body) = r.into_parts();
        let Body::Stream(mut chunks) = body else {
            panic!("expected a streamed body");
        };
        assert_eq!(chunks.recv().await, Some(Bytes::from_static(b"chunk-1")));
        assert_eq!(chunks.recv().await, Some(Bytes::from_static(b"chunk-2")));
        assert_eq!(chunks.recv().await, None);
    }
}
