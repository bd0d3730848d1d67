//! Cache entry storage.
//!
//! [`Storage`] is the backing-store seam: the middleware only ever needs
//! fallible async `get`/`set` with a per-entry TTL. [`MemoryStorage`], the
//! default implementation, is a bounded in-process cache built on `moka`.

use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use moka::{Expiry, future::Cache};

use crate::http::{Body, Headers, Response, StatusCode};
use crate::middleware::BoxError;

/// An immutable snapshot of a cacheable response.
///
/// Captured once by the request that produced the response; every consumer
/// afterwards gets its own copy and rebuilds a fresh [`Response`] from it,
/// so no shared mutable state ever leaves the store. Cloning is cheap:
/// the body is a reference-counted [`Bytes`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl CacheEntry {
    /// Snapshots a response into a storable entry.
    ///
    /// Returns `None` for streamed bodies: a stream can only be consumed
    /// once, so there is nothing replayable to store.
    pub fn from_response(response: &Response) -> Option<Self> {
        let body = response.payload()?.clone();
        Some(Self {
            status: response.status(),
            headers: response.headers().clone(),
            body,
        })
    }

    /// Builds a response carrying this entry's status, headers, and body.
    pub fn into_response(self) -> Response {
        Response::from_parts(self.status, self.headers, Body::Full(self.body))
    }

    /// Returns the captured status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the captured headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the captured body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Backing store for cached responses.
///
/// Implementations must be shareable across tasks; the middleware holds the
/// store behind an [`Arc`](std::sync::Arc) and calls it concurrently.
pub trait Storage: Send + Sync + 'static {
    /// Looks up a fresh entry by key.
    ///
    /// # Errors
    ///
    /// Backends with I/O (network stores, disk stores) surface their
    /// failures here; the in-memory default never fails.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry>, BoxError>> + Send;

    /// Stores an entry under `key` for `ttl`.
    ///
    /// A zero `ttl` falls back to the backend's configured default
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Backends with I/O surface their failures here; the in-memory default
    /// never fails.
    fn set(
        &self,
        key: String,
        entry: CacheEntry,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Configuration for [`MemoryStorage`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries held before eviction kicks in.
    pub capacity: u64,
    /// Lifetime applied when an entry is stored without an explicit TTL.
    pub max_age: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 5000,
            max_age: Duration::from_secs(30 * 60),
        }
    }
}

/// An entry together with the lifetime it was stored under, so the expiry
/// policy can read the TTL back out of the value.
#[derive(Clone)]
struct Stored {
    entry: CacheEntry,
    ttl: Duration,
}

/// Per-entry TTL policy: every insert, overwrites included, restarts the
/// clock with the lifetime recorded in the stored value.
struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-process response store.
///
/// Entries expire individually according to the TTL they were stored with;
/// when the store is full, `moka`'s eviction policy makes room. Lookups of
/// expired entries behave as misses even before eviction runs.
pub struct MemoryStorage {
    inner: Cache<String, Stored>,
    max_age: Duration,
}

impl MemoryStorage {
    /// Creates a store with the given capacity and default lifetime.
    pub fn new(config: StoreConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            inner,
            max_age: config.max_age,
        }
    }

    /// Returns the number of entries currently held.
    ///
    /// The count is eventually consistent; recently expired or evicted
    /// entries may still be included.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, BoxError> {
        Ok(self.inner.get(key).await.map(|stored| stored.entry))
    }

    async fn set(&self, key: String, entry: CacheEntry, ttl: Duration) -> Result<(), BoxError> {
        let ttl = if ttl.is_zero() { self.max_age } else { ttl };
        self.inner.insert(key, Stored { entry, ttl }).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn entry(body: &'static str) -> CacheEntry {
        CacheEntry::from_response(
            &Response::new(StatusCode::Ok)
                .header("Cache-Control", "public, max-age=60")
                .body(body),
        )
        .unwrap()
    }

    fn small_store(max_age: Duration) -> MemoryStorage {
        MemoryStorage::new(StoreConfig {
            capacity: 16,
            max_age,
        })
    }

    #[test]
    fn default_config_is_5000_entries_for_30_minutes() {
        let config = StoreConfig::default();
        assert_eq!(config.capacity, 5000);
        assert_eq!(config.max_age, Duration::from_secs(1800));
    }

    #[test]
    fn streamed_responses_are_not_snapshotted() {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let response = Response::new(StatusCode::Ok).stream(rx);
        assert!(CacheEntry::from_response(&response).is_none());
    }

    #[test]
    fn entry_rebuilds_an_equivalent_response() {
        let rebuilt = entry("payload").into_response();
        assert_eq!(rebuilt.status(), StatusCode::Ok);
        assert_eq!(
            rebuilt.headers().get("cache-control"),
            Some("public, max-age=60")
        );
        assert_eq!(rebuilt.payload().map(|b| &b[..]), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn get_returns_what_set_stored() {
        let store = MemoryStorage::default();
        store
            .set("GET-/a".into(), entry("a"), Duration::from_secs(60))
            .await
            .unwrap();

        let found = store.get("GET-/a").await.unwrap().unwrap();
        assert_eq!(found.body(), &Bytes::from_static(b"a"));
        assert!(store.get("GET-/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let store = small_store(Duration::from_secs(60));
        store
            .set("k".into(), entry("v"), Duration::from_millis(150))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        sleep(Duration::from_millis(300)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overwrite_restarts_the_clock() {
        let store = small_store(Duration::from_secs(60));
        store
            .set("k".into(), entry("v1"), Duration::from_millis(300))
            .await
            .unwrap();

        sleep(Duration::from_millis(200)).await;
        store
            .set("k".into(), entry("v2"), Duration::from_millis(300))
            .await
            .unwrap();

        // Past the first entry's deadline, inside the second's.
        sleep(Duration::from_millis(200)).await;
        let found = store.get("k").await.unwrap().unwrap();
        assert_eq!(found.body(), &Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn zero_ttl_uses_the_default_lifetime() {
        let store = small_store(Duration::from_millis(150));
        store
            .set("k".into(), entry("v"), Duration::ZERO)
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        sleep(Duration::from_millis(300)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn capacity_bounds_the_store() {
        let store = MemoryStorage::new(StoreConfig {
            capacity: 2,
            max_age: Duration::from_secs(60),
        });
        for i in 0..8 {
            store
                .set(format!("k{i}"), entry("v"), Duration::from_secs(60))
                .await
                .unwrap();
        }
        store.inner.run_pending_tasks().await;
        assert!(store.entry_count() <= 2);
    }
}
