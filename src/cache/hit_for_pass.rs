//! Hit-for-pass negative cache.
//!
//! Remembers keys whose responses recently proved non-cacheable so that
//! follow-up requests go straight downstream instead of queueing behind a
//! leader that will not produce a shareable entry.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::lock;

/// Most keys tracked at once; older markers fall off the LRU end.
const CAPACITY: NonZeroUsize = NonZeroUsize::new(1000).unwrap();

/// Bounded table of known-non-cacheable keys.
///
/// Each marker records when its key was marked; staleness is judged against
/// the configured window on lookup, for any window size up to
/// `Duration::MAX`. Lookups never extend a marker's life, and stale markers
/// are dropped the moment they are seen.
pub struct HitForPass {
    ttl: Duration,
    markers: Mutex<LruCache<String, Instant>>,
}

impl HitForPass {
    /// Creates a table whose markers expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            markers: Mutex::new(LruCache::new(CAPACITY)),
        }
    }

    /// Returns `true` if `key` was marked non-cacheable within the window.
    pub fn contains(&self, key: &str) -> bool {
        let mut markers = lock(&self.markers, "hit_for_pass");
        match markers.peek(key) {
            Some(marked_at) if marked_at.elapsed() < self.ttl => true,
            Some(_) => {
                markers.pop(key);
                false
            }
            None => false,
        }
    }

    /// Marks `key` as pass-worthy for the configured window.
    ///
    /// Re-marking an already tracked key restarts its window.
    pub fn insert(&self, key: &str) {
        lock(&self.markers, "hit_for_pass").put(key.to_owned(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn fresh_markers_are_visible() {
        let table = HitForPass::new(Duration::from_secs(300));
        assert!(!table.contains("GET-/a"));
        table.insert("GET-/a");
        assert!(table.contains("GET-/a"));
        assert!(!table.contains("GET-/b"));
    }

    #[tokio::test]
    async fn stale_markers_expire_and_are_dropped() {
        let table = HitForPass::new(Duration::from_millis(100));
        table.insert("GET-/a");
        assert!(table.contains("GET-/a"));

        sleep(Duration::from_millis(200)).await;
        assert!(!table.contains("GET-/a"));
        // The lookup above removed the stale marker outright.
        assert_eq!(table.markers.lock().unwrap().len(), 0);
    }

    #[test]
    fn enormous_windows_do_not_panic() {
        let table = HitForPass::new(Duration::MAX);
        table.insert("GET-/a");
        assert!(table.contains("GET-/a"));
    }

    #[test]
    fn capacity_evicts_the_oldest_marker() {
        let table = HitForPass::new(Duration::from_secs(300));
        for i in 0..=CAPACITY.get() {
            table.insert(&format!("GET-/{i}"));
        }
        assert!(!table.contains("GET-/0"));
        assert!(table.contains(&format!("GET-/{}", CAPACITY.get())));
        assert_eq!(table.markers.lock().unwrap().len(), CAPACITY.get());
    }
}
