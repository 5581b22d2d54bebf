// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity store that evicts the least-recently-accessed entry. Reads and writes both count as access.
///
/// Every operation holds the lock only for the map operation itself; callers clone values out.
pub struct RecencyStore<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V, ahash::RandomState>>,
}

impl<K: Hash + Eq, V: Clone> RecencyStore<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::with_hasher(capacity, ahash::RandomState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V, ahash::RandomState>> {
        // nothing we do under this lock can leave the map half-updated, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a value, marking it as most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Insert or replace a value, marking it as most recently used.
    ///
    /// Returns the key that was evicted to make room, if any. Replacing an existing key never evicts.
    pub fn insert(&self, key: K, value: V) -> Option<K> {
        let mut cache = self.lock();
        let replacing = cache.contains(&key);
        let displaced = cache.push(key, value);
        if replacing {
            None
        } else {
            displaced.map(|(evicted_key, _)| evicted_key)
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().pop(key)
    }

    /// Remove `key` only if `predicate` holds for its current value. Does not count as an access.
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&V) -> bool) -> bool {
        let mut cache = self.lock();
        if cache.peek(key).is_some_and(predicate) {
            cache.pop(key);
            true
        } else {
            false
        }
    }

    /// Check for a key without touching its recency
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    fn store(capacity: usize) -> RecencyStore<&'static str, u32> {
        RecencyStore::new(NonZeroUsize::new(capacity).expect("capacity should be nonzero"))
    }

    #[test]
    #[traced_test]
    fn test_evicts_least_recently_inserted() {
        let store = store(2);
        assert_eq!(store.insert("a", 1), None);
        assert_eq!(store.insert("b", 2), None);
        assert_eq!(store.insert("c", 3), Some("a"));
        assert!(!store.contains(&"a"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_read_counts_as_access() {
        let store = store(2);
        store.insert("a", 1);
        store.insert("b", 2);
        assert_eq!(store.get(&"a"), Some(1));
        assert_eq!(store.insert("c", 3), Some("b"));
        assert_eq!(store.get(&"a"), Some(1));
        assert_eq!(store.get(&"b"), None);
    }

    #[test]
    #[traced_test]
    fn test_replace_does_not_evict() {
        let store = store(2);
        store.insert("a", 1);
        store.insert("b", 2);
        assert_eq!(store.insert("a", 10), None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&"a"), Some(10));
        // "a" was touched by the replacement, so "b" goes next
        assert_eq!(store.insert("c", 3), Some("b"));
    }

    #[test]
    #[traced_test]
    fn test_remove_if() {
        let store = store(4);
        store.insert("a", 1);
        assert!(!store.remove_if(&"a", |value| *value == 2));
        assert!(store.remove_if(&"a", |value| *value == 1));
        assert!(store.is_empty());
        assert!(!store.remove_if(&"missing", |_| true));
    }

    #[test]
    #[traced_test]
    fn test_capacity() {
        let store = store(3);
        assert_eq!(store.capacity(), 3);
        store.insert("a", 1);
        store.clear();
        assert!(store.is_empty());
    }
}
