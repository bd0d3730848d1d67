//! Middleware pipeline — composable before/after request handler logic.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response decoration without coupling handlers to infrastructure
//! concerns. The pipeline is fallible end to end: every layer yields
//! `Result<Response, BoxError>`, so downstream failures travel back through the
//! stack unchanged.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`BoxError`] — the type-erased error shared across the pipeline.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context};

/// Type-erased error carried through the middleware pipeline.
///
/// Any concrete error that is `Error + Send + Sync` converts into a
/// `BoxError` with `?`, so middleware and handlers stay decoupled from each
/// other's failure types.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware (or returns a fallback `500` response when the chain is exhausted
/// without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use shellac::{Response, context::Context, middleware::{BoxError, Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Result<Response, BoxError>> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// Construct one with [`from_middleware`] or by wrapping a closure directly:
///
/// ```rust,no_run
/// use std::{pin::Pin, sync::Arc};
/// use shellac::{Response, context::Context, middleware::{MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(|ctx: Context, next: Next| {
///     Box::pin(async move { next.run(ctx).await })
/// });
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Arguments
///
/// - `middleware` — a reference-counted [`Middleware`] to wrap.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use shellac::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    ///
    /// # Arguments
    ///
    /// - `middlewares` — the ordered list of handlers that make up the pipeline.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use shellac::middleware::Next;
    ///
    /// let next = Next::new(vec![]);
    /// ```
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its result.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains (i.e. the chain is
    /// exhausted without producing a response), a `500 Internal Server Error`
    /// response is returned as a safe fallback.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the per-request [`Context`] to pass to the next middleware.
    ///
    /// # Returns
    ///
    /// The result produced by the next middleware or handler in the chain.
    pub async fn run(mut self, ctx: Context) -> Result<Response, BoxError> {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Ok(Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline"))
        }
    }
}

/// The core trait for all shellac middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the result, and return
///   a modified copy.
/// - **Fail** — return an error, or forward one coming from downstream.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited across
///   `.await` points in multi-threaded runtimes.
/// - Implementations **should not** hold `&mut` references to shared state across
///   an `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the per-request [`Context`] carrying the HTTP method, request
    ///   target, and request headers.
    /// - `next` — cursor into the remainder of the middleware chain; call
    ///   [`Next::run`] to forward the request.
    ///
    /// # Returns
    ///
    /// A [`Response`] — either produced by this middleware directly (short-circuit)
    /// or forwarded from a downstream handler — or the error that stopped the
    /// chain.
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;
}

/// Built-in middleware that logs each request's method, target, outcome, and duration.
///
/// Emits a single `tracing::info!` line after the downstream handler completes,
/// in the format:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// Failed requests are logged at `warn` level with the error instead of a
/// status. `LoggerMiddleware` does not short-circuit; it always delegates to
/// the next middleware and decorates the result timing after the fact.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use shellac::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    /// Log the request method, target, outcome, and elapsed time.
    ///
    /// Captures the start time before delegating to the next middleware, then
    /// emits a `tracing` record once the result is available.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the per-request [`Context`]; method and target are extracted
    ///   before `next` consumes it.
    /// - `next` — the remainder of the middleware chain.
    ///
    /// # Returns
    ///
    /// The unmodified result returned by the downstream handler.
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.method().as_str().to_string();
            let url = ctx.url().to_string();

            let result = next.run(ctx).await;

            let duration = start.elapsed();
            match &result {
                Ok(response) => {
                    tracing::info!(
                        "{} {} - {} ({:?})",
                        method,
                        url,
                        response.status().as_u16(),
                        duration
                    );
                }
                Err(error) => {
                    tracing::warn!("{} {} - failed: {} ({:?})", method, url, error, duration);
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::http::{Method, StatusCode};

    fn fixed_handler(body: &'static str) -> MiddlewareHandler {
        Arc::new(move |_ctx, _next| {
            Box::pin(async move { Ok(Response::new(StatusCode::Ok).body(body)) })
        })
    }

    #[tokio::test]
    async fn exhausted_chain_falls_back_to_500() {
        let chain = Next::new(vec![]);
        let response = chain.run(Context::new(Method::Get, "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(
            response.payload().map(|b| &b[..]),
            Some(&b"No response generated by middleware pipeline"[..])
        );
    }

    #[tokio::test]
    async fn layers_run_in_registration_order() {
        let decorator: MiddlewareHandler = Arc::new(|ctx, next| {
            Box::pin(async move {
                let mut response = next.run(ctx).await?;
                response.add_header("X-Decorated", "yes");
                Ok(response)
            })
        });

        let chain = Next::new(vec![decorator, fixed_handler("payload")]);
        let response = chain.run(Context::new(Method::Get, "/")).await.unwrap();
        assert_eq!(response.headers().get("x-decorated"), Some("yes"));
        assert_eq!(response.payload().map(|b| &b[..]), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let downstream: MiddlewareHandler = Arc::new(move |_ctx, _next| {
            let counted = Arc::clone(&counted);
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new(StatusCode::Ok).body("downstream"))
            })
        });
        let gate: MiddlewareHandler = Arc::new(|_ctx, _next| {
            Box::pin(async move { Ok(Response::new(StatusCode::Forbidden).body("denied")) })
        });

        let chain = Next::new(vec![gate, downstream]);
        let response = chain.run(Context::new(Method::Get, "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::Forbidden);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn errors_travel_back_unchanged() {
        let failing: MiddlewareHandler = Arc::new(|_ctx, _next| {
            Box::pin(async move {
                Err::<Response, BoxError>("backend exploded".to_string().into())
            })
        });
        let passthrough = from_middleware(Arc::new(LoggerMiddleware));

        let chain = Next::new(vec![passthrough, failing]);
        let err = chain
            .run(Context::new(Method::Get, "/boom"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "backend exploded");
    }
}
