//! Demonstrates request coalescing and hit-for-pass behavior.
//!
//! Run with:
//!
//! ```text
//! cargo run --example coalesce
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shellac::cache::CacheMiddleware;
use shellac::context::Context;
use shellac::http::{Method, Response, StatusCode};
use shellac::middleware::{BoxError, LoggerMiddleware, MiddlewareHandler, Next, from_middleware};

async fn send(pipeline: &[MiddlewareHandler], ctx: Context) -> Result<Response, BoxError> {
    Next::new(pipeline.to_vec()).run(ctx).await
}

fn body_text(response: &Response) -> &str {
    response
        .payload()
        .and_then(|body| std::str::from_utf8(body).ok())
        .unwrap_or("<stream>")
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shellac=debug,info")),
        )
        .init();

    let fetches = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&fetches);
    let backend: MiddlewareHandler = Arc::new(move |ctx: Context, _next| {
        let counted = Arc::clone(&counted);
        Box::pin(async move {
            let fetch = counted.fetch_add(1, Ordering::SeqCst);
            // Pretend to hit a slow upstream.
            sleep(Duration::from_millis(300)).await;
            let cache_control = if ctx.path() == "/profile" {
                "private, max-age=60"
            } else {
                "public, max-age=2"
            };
            Ok(Response::new(StatusCode::Ok)
                .header("Cache-Control", cache_control)
                .body(format!("fetch #{fetch} for {}", ctx.url())))
        })
    });

    let cache = Arc::new(CacheMiddleware::new());
    let pipeline = vec![
        from_middleware(Arc::new(LoggerMiddleware)),
        from_middleware(Arc::clone(&cache)),
        backend,
    ];

    info!("three concurrent requests for the same key collapse into one fetch");
    let (a, b, c) = tokio::join!(
        send(&pipeline, Context::new(Method::Get, "/articles?page=1")),
        send(&pipeline, Context::new(Method::Get, "/articles?page=1")),
        send(&pipeline, Context::new(Method::Get, "/articles?page=1")),
    );
    for response in [a?, b?, c?] {
        info!(body = %body_text(&response), "served");
    }

    info!("a follow-up request is a plain store hit");
    let hit = send(&pipeline, Context::new(Method::Get, "/articles?page=1")).await?;
    info!(body = %body_text(&hit), "served");

    info!("private responses are fetched per request and marked hit-for-pass");
    let (d, e) = tokio::join!(
        send(&pipeline, Context::new(Method::Get, "/profile")),
        send(&pipeline, Context::new(Method::Get, "/profile")),
    );
    for response in [d?, e?] {
        info!(body = %body_text(&response), "served");
    }

    sleep(Duration::from_millis(2200)).await;
    info!("the cached entry has expired; the next request fetches again");
    let fresh = send(&pipeline, Context::new(Method::Get, "/articles?page=1")).await?;
    info!(body = %body_text(&fresh), "served");

    info!(
        total_fetches = fetches.load(Ordering::SeqCst),
        "demo finished"
    );
    Ok(())
}
