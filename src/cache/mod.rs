//! Response caching with request coalescing.
//!
//! [`CacheMiddleware`] serves repeated `GET`/`HEAD` requests from an
//! in-memory store and collapses concurrent duplicates for a not-yet-cached
//! key into a single downstream execution (dog-pile prevention). The pieces:
//!
//! - [`policy`] — decides whether a response is cacheable and for how long,
//!   from its status code and `Cache-Control` header.
//! - [`store`] — the [`Storage`] seam plus [`MemoryStorage`], a bounded
//!   in-process store with per-entry TTLs.
//! - [`hit_for_pass`] — short-lived markers for keys that recently proved
//!   non-cacheable, so follow-up requests skip the coalescing queue.
//! - [`fetch`] — the in-flight registry: one leader per key, waiters parked
//!   until the leader settles them in arrival order.
//! - [`middleware`] — the orchestrator tying it all together, configured via
//!   [`CacheConfig`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shellac::cache::CacheMiddleware;
//! use shellac::middleware::from_middleware;
//!
//! let cache = from_middleware(Arc::new(CacheMiddleware::new()));
//! ```

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::warn;

pub mod fetch;
pub mod hit_for_pass;
pub mod middleware;
pub mod policy;
pub mod store;

pub use fetch::{FetchCoordinator, FetchOutcome, FetchRole};
pub use hit_for_pass::HitForPass;
pub use middleware::{CacheConfig, CacheMiddleware, CacheablePredicate, KeyFn};
pub use store::{CacheEntry, MemoryStorage, Storage, StoreConfig};

/// Errors produced by the caching layer itself.
///
/// Downstream handler errors are never wrapped; they travel through the
/// pipeline untouched. This type covers failures of the cache machinery.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed during a lookup.
    #[error("cache storage error: {0}")]
    Storage(#[source] crate::middleware::BoxError),
}

/// Locks a mutex, recovering the guard if another thread poisoned it.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, target: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(target_module = target, "recovered from poisoned cache lock");
            poisoned.into_inner()
        }
    }
}
