//! Bounded LRU cache of fetched documents

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Fixed-capacity least-recently-used cache.
///
/// `get` and `put` refresh recency; `has` does not, so prefetch planning can
/// check the cache without reordering it.
#[derive(Debug)]
pub struct ResultCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V: Clone> ResultCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Cached value, marking the entry most recently used
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Insert or overwrite, evicting the least recently used entry when full
    pub fn put(&mut self, key: K, value: V) {
        self.entries.put(key, value);
    }

    /// Membership test that leaves recency untouched
    pub fn has(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
