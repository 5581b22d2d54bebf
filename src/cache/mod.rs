// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! In-memory cache building blocks shared by the shard, rank, and profile layers.
//!
//! Nothing here sweeps in the background: expiry is always decided at read time against an injected clock.

mod recency;

use crate::time::SimpleTime;
pub use recency::RecencyStore;
use std::hash::Hash;
use std::time::Duration;

/// A cached payload and the time it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: SimpleTime,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, fetched_at: SimpleTime) -> Self {
        Self { value, fetched_at }
    }

    /// An entry exactly `ttl` old is still fresh
    pub fn is_expired(&self, now: SimpleTime, ttl: Duration) -> bool {
        now.duration_since(self.fetched_at) > ttl
    }
}

/// Time-bounded "don't try this again yet" markers, used for both negative results and failure backoff.
///
/// Each marker stores the earliest time a retry is allowed. Elapsed markers are dropped lazily when read.
pub struct MarkerCache<K> {
    map: papaya::HashMap<K, SimpleTime, ahash::RandomState>,
}

impl<K> Default for MarkerCache<K> {
    fn default() -> Self {
        Self {
            map: papaya::HashMap::with_hasher(ahash::RandomState::new()),
        }
    }
}

impl<K> MarkerCache<K>
where
    K: Hash + Eq + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Block retries of `key` until `retry_not_before`, replacing any existing marker
    pub fn mark(&self, key: K, retry_not_before: SimpleTime) {
        self.map.pin().insert(key, retry_not_before);
    }

    /// Check if `key` is still blocked at `now`. An elapsed marker is removed.
    pub fn is_live(&self, key: &K, now: SimpleTime) -> bool {
        let map = self.map.pin();
        match map.get(key) {
            Some(retry_not_before) if now < *retry_not_before => true,
            Some(_) => {
                // only remove if nobody re-marked it since we looked
                let _ = map.remove_if(key, |_, retry_not_before| now >= *retry_not_before);
                false
            }
            None => false,
        }
    }

    /// Remove a marker. Returns `true` if one existed.
    pub fn clear(&self, key: &K) -> bool {
        self.map.pin().remove(key).is_some()
    }

    pub fn clear_all(&self) {
        self.map.pin().clear();
    }

    /// Number of stored markers, including elapsed ones nobody has read yet
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_entry_expiry_boundary() {
        let fetched_at = SimpleTime::from_unix_millis(1_000);
        let entry = CacheEntry::new("payload", fetched_at);
        let ttl = Duration::from_secs(10);
        assert!(!entry.is_expired(SimpleTime::from_unix_millis(1_000), ttl));
        assert!(!entry.is_expired(SimpleTime::from_unix_millis(11_000), ttl));
        assert!(entry.is_expired(SimpleTime::from_unix_millis(11_001), ttl));
    }

    #[test]
    #[traced_test]
    fn test_marker_lifecycle() {
        let markers = MarkerCache::new();
        let start = SimpleTime::from_unix_millis(5_000);
        markers.mark("toyco", start.saturating_add(Duration::from_secs(30)));

        assert!(markers.is_live(&"toyco", start));
        assert!(!markers.is_live(&"zezima", start));
        assert_eq!(markers.len(), 1);

        // elapsed markers are dropped on read
        assert!(!markers.is_live(&"toyco", start.saturating_add(Duration::from_secs(30))));
        assert!(markers.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_marker_clear() {
        let markers = MarkerCache::new();
        let now = SimpleTime::from_unix_millis(0);
        markers.mark(1u32, now.saturating_add(Duration::from_secs(1)));
        markers.mark(2u32, now.saturating_add(Duration::from_secs(1)));
        assert!(markers.clear(&1));
        assert!(!markers.clear(&1));
        assert!(!markers.is_live(&1, now));
        assert!(markers.is_live(&2, now));
        markers.clear_all();
        assert!(markers.is_empty());
    }
}
