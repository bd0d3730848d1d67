//! In-flight request coordination.
//!
//! At most one request per cache key runs downstream at a time. The first
//! request to claim a key becomes its leader; concurrent duplicates become
//! waiters parked on a oneshot channel until the leader settles them, in
//! arrival order. This is what turns a thundering herd for a cold key into
//! a single downstream execution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::lock;
use super::store::CacheEntry;

type Registry = Arc<Mutex<HashMap<String, Vec<oneshot::Sender<FetchOutcome>>>>>;

/// What the leader hands each waiter.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The leader produced a cacheable response; serve this copy.
    Cached(CacheEntry),
    /// No shareable entry came out of the fetch; run downstream yourself.
    Pass,
}

/// The role assigned to a request by [`FetchCoordinator::join`].
pub enum FetchRole {
    /// First request for the key: run downstream, then settle the others.
    Leader(FetchClaim),
    /// Duplicate request: await the leader's outcome.
    Waiter(oneshot::Receiver<FetchOutcome>),
}

/// Registry of cache keys currently being fetched downstream.
///
/// Clones share the same registry; the middleware keeps one per instance.
#[derive(Clone, Default)]
pub struct FetchCoordinator {
    inflight: Registry,
}

impl FetchCoordinator {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a leader currently holds `key`.
    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.inflight, "fetch").contains_key(key)
    }

    /// Joins the fetch for `key`.
    ///
    /// The check for an existing registration and the claim of a vacant one
    /// happen under a single lock, so two concurrent requests can never
    /// both lead the same key. Waiters are queued in call order.
    pub fn join(&self, key: &str) -> FetchRole {
        let mut inflight = lock(&self.inflight, "fetch");
        match inflight.get_mut(key) {
            Some(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                FetchRole::Waiter(rx)
            }
            None => {
                inflight.insert(key.to_owned(), Vec::new());
                FetchRole::Leader(FetchClaim {
                    key: key.to_owned(),
                    inflight: Arc::clone(&self.inflight),
                    released: false,
                })
            }
        }
    }
}

/// Exclusive right, and obligation, to settle the waiters for one key.
///
/// Settlement happens through [`release`](Self::release). If the claim is
/// dropped first (the leader panicked or was cancelled), the waiters are
/// settled with [`FetchOutcome::Pass`] so they retry downstream instead of
/// hanging forever.
pub struct FetchClaim {
    key: String,
    inflight: Registry,
    released: bool,
}

impl FetchClaim {
    /// Settles every waiter in arrival order and clears the registration.
    ///
    /// `Some(entry)` hands each waiter its own copy of the entry; `None`
    /// tells each waiter to run downstream itself.
    pub fn release(mut self, entry: Option<&CacheEntry>) {
        self.settle(entry);
    }

    fn settle(&mut self, entry: Option<&CacheEntry>) {
        self.released = true;
        let waiters = lock(&self.inflight, "fetch")
            .remove(&self.key)
            .unwrap_or_default();
        if !waiters.is_empty() {
            debug!(key = %self.key, waiters = waiters.len(), "releasing coalesced requests");
        }
        for waiter in waiters {
            let outcome = match entry {
                Some(entry) => FetchOutcome::Cached(entry.clone()),
                None => FetchOutcome::Pass,
            };
            // A waiter that gave up already dropped its receiver; skip it.
            let _ = waiter.send(outcome);
        }
    }
}

impl Drop for FetchClaim {
    fn drop(&mut self) {
        if !self.released {
            warn!(key = %self.key, "fetch abandoned before release; passing waiters through");
            self.settle(None);
        }
    }
}
