//! # shellac
//!
//! Response caching middleware with request coalescing for async Rust
//! services.
//!
//! Repeated `GET`/`HEAD` requests are served from a bounded in-memory store
//! keyed on request identity. Concurrent duplicates for a not-yet-cached key
//! collapse into a single downstream execution whose result fans out to
//! every waiter (dog-pile prevention), and keys that recently proved
//! non-cacheable are remembered in a hit-for-pass table so later requests
//! skip the queue entirely.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use shellac::cache::CacheMiddleware;
//! use shellac::context::Context;
//! use shellac::http::{Method, Response, StatusCode};
//! use shellac::middleware::{MiddlewareHandler, Next, from_middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let cache = Arc::new(CacheMiddleware::new());
//!     let handler: MiddlewareHandler = Arc::new(|_ctx, _next| {
//!         Box::pin(async {
//!             Ok(Response::new(StatusCode::Ok)
//!                 .header("Cache-Control", "public, max-age=60")
//!                 .body("Hello, World!"))
//!         })
//!     });
//!
//!     let chain = Next::new(vec![from_middleware(Arc::clone(&cache)), handler]);
//!     let response = chain.run(Context::new(Method::Get, "/hello")).await?;
//!     assert_eq!(response.status(), StatusCode::Ok);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheEntry, CacheError, CacheMiddleware, MemoryStorage, Storage};
pub use context::Context;
pub use http::{Body, Headers, Method, Response, StatusCode};
pub use middleware::{BoxError, Middleware, MiddlewareHandler, Next, from_middleware};
