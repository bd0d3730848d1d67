//! Response caching middleware.
//!
//! The orchestrator: derives a cache key per request, serves hits from the
//! store, coalesces concurrent misses through the fetch registry, and
//! records non-cacheable outcomes as hit-for-pass markers.
//!
//! Per request, in order:
//!
//! 1. Only `GET` and `HEAD` requests participate; everything else goes
//!    straight downstream.
//! 2. The configured cacheability predicate may veto the request.
//! 3. The cache key is derived (`"METHOD-url"` by default).
//! 4. Keys marked hit-for-pass skip the cache entirely.
//! 5. A store hit is served as a fresh copy without touching downstream.
//! 6. If another request already leads this key, park until it settles us.
//! 7. Otherwise lead: run downstream, store the response if policy allows,
//!    and settle the waiters either way.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::Context;
use crate::http::{Method, Response};
use crate::middleware::{BoxError, Middleware, Next};

use super::CacheError;
use super::fetch::{FetchCoordinator, FetchOutcome, FetchRole};
use super::hit_for_pass::HitForPass;
use super::policy;
use super::store::{CacheEntry, MemoryStorage, Storage, StoreConfig};

/// Derives the cache key for a request.
pub type KeyFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// Request-level veto: return `false` to bypass caching for a request.
pub type CacheablePredicate = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Configuration for [`CacheMiddleware`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shellac::cache::{CacheConfig, CacheMiddleware, StoreConfig};
///
/// let cache = CacheMiddleware::with_config(
///     CacheConfig::new()
///         .key_fn(|ctx| ctx.path().to_owned())
///         .cacheable(|ctx| !ctx.path().starts_with("/admin"))
///         .hit_for_pass(Duration::from_secs(60))
///         .store(StoreConfig {
///             capacity: 10_000,
///             max_age: Duration::from_secs(600),
///         }),
/// );
/// ```
#[derive(Clone)]
pub struct CacheConfig {
    key_fn: KeyFn,
    is_cacheable: CacheablePredicate,
    hit_for_pass: Duration,
    store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_fn: Arc::new(|ctx| format!("{}-{}", ctx.method(), ctx.url())),
            is_cacheable: Arc::new(|_| true),
            hit_for_pass: Duration::from_secs(300),
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache key derivation (default: `"METHOD-url"`).
    #[must_use]
    pub fn key_fn(mut self, key_fn: impl Fn(&Context) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Replaces the cacheability predicate (default: everything cacheable).
    #[must_use]
    pub fn cacheable(
        mut self,
        is_cacheable: impl Fn(&Context) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_cacheable = Arc::new(is_cacheable);
        self
    }

    /// Sets how long non-cacheable keys bypass the cache (default 300 seconds).
    #[must_use]
    pub fn hit_for_pass(mut self, ttl: Duration) -> Self {
        self.hit_for_pass = ttl;
        self
    }

    /// Configures the default in-memory store.
    #[must_use]
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// Caching middleware with request coalescing.
///
/// Owns its store, hit-for-pass table, and fetch registry; two instances
/// never share state. Cloning an instance shares all of them, which is how
/// [`Middleware::handle`] hands state to the per-request future.
pub struct CacheMiddleware<S = MemoryStorage> {
    storage: Arc<S>,
    fetching: FetchCoordinator,
    hit_for_pass: Arc<HitForPass>,
    key_fn: KeyFn,
    is_cacheable: CacheablePredicate,
}

impl CacheMiddleware<MemoryStorage> {
    /// Creates a middleware with default configuration and in-memory storage.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a middleware with the given configuration and in-memory storage.
    pub fn with_config(config: CacheConfig) -> Self {
        let storage = Arc::new(MemoryStorage::new(config.store.clone()));
        Self::assemble(storage, config)
    }
}

impl Default for CacheMiddleware<MemoryStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> CacheMiddleware<S> {
    /// Creates a middleware backed by a caller-provided store.
    ///
    /// The `store` section of `config` is ignored; the provided backend
    /// brings its own sizing.
    pub fn with_storage(storage: Arc<S>, config: CacheConfig) -> Self {
        Self::assemble(storage, config)
    }

    fn assemble(storage: Arc<S>, config: CacheConfig) -> Self {
        Self {
            storage,
            fetching: FetchCoordinator::new(),
            hit_for_pass: Arc::new(HitForPass::new(config.hit_for_pass)),
            key_fn: config.key_fn,
            is_cacheable: config.is_cacheable,
        }
    }

    async fn dispatch(&self, ctx: Context, next: Next) -> Result<Response, BoxError> {
        // Only GET and HEAD participate in caching.
        if !matches!(ctx.method(), Method::Get | Method::Head) {
            return next.run(ctx).await;
        }
        if !(self.is_cacheable)(&ctx) {
            return next.run(ctx).await;
        }

        let key = (self.key_fn)(&ctx);

        if self.hit_for_pass.contains(&key) {
            debug!(key = %key, "hit-for-pass; bypassing cache");
            return next.run(ctx).await;
        }

        if let Some(entry) = self.storage.get(&key).await.map_err(CacheError::Storage)? {
            debug!(key = %key, "cache hit");
            return Ok(entry.into_response());
        }

        match self.fetching.join(&key) {
            FetchRole::Waiter(outcome) => match outcome.await {
                Ok(FetchOutcome::Cached(entry)) => {
                    debug!(key = %key, "coalesced; serving leader's response");
                    Ok(entry.into_response())
                }
                // Pass, or a leader that vanished: fetch independently.
                Ok(FetchOutcome::Pass) | Err(_) => next.run(ctx).await,
            },
            FetchRole::Leader(claim) => {
                let response = match next.run(ctx).await {
                    Ok(response) => response,
                    Err(err) => {
                        claim.release(None);
                        self.hit_for_pass.insert(&key);
                        return Err(err);
                    }
                };

                // The policy must see every Cache-Control entry; a `private`
                // in a second entry vetoes just like one in the first.
                let cache_control = response.headers().combined("cache-control");
                let ttl = policy::evaluate(response.status(), cache_control.as_deref())
                    .filter(|ttl| !ttl.is_zero());
                // Streamed bodies cannot be replayed; they are never stored
                // or shared, whatever the headers say.
                let cacheable =
                    ttl.and_then(|ttl| CacheEntry::from_response(&response).map(|e| (ttl, e)));

                match cacheable {
                    Some((ttl, entry)) => {
                        match self.storage.set(key.clone(), entry.clone(), ttl).await {
                            Ok(()) => {
                                debug!(key = %key, ttl_secs = ttl.as_secs(), "stored response");
                            }
                            Err(err) => {
                                warn!(key = %key, error = %err, "failed to store cache entry");
                            }
                        }
                        claim.release(Some(&entry));
                    }
                    None => {
                        claim.release(None);
                        self.hit_for_pass.insert(&key);
                        debug!(key = %key, "response not cacheable; marked hit-for-pass");
                    }
                }

                Ok(response)
            }
        }
    }
}

impl<S> Clone for CacheMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            fetching: self.fetching.clone(),
            hit_for_pass: Arc::clone(&self.hit_for_pass),
            key_fn: Arc::clone(&self.key_fn),
            is_cacheable: Arc::clone(&self.is_cacheable),
        }
    }
}

impl<S: Storage> Middleware for CacheMiddleware<S> {
    fn handle(
        &self,
        ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>> {
        let cache = self.clone();
        Box::pin(async move { cache.dispatch(ctx, next).await })
    }
}
