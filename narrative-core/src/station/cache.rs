//! Injectable per-station output caches.

use dashmap::DashMap;

/// Storage for station outputs keyed by serialized input.
pub trait StationCache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    fn set(&self, key: String, value: V);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local cache backed by a concurrent map.
///
/// Concurrent writes to the same key overwrite each other; the values are
/// equivalent because the key is the full input.
pub struct InMemoryCache<V> {
    entries: DashMap<String, V>,
}

impl<V> InMemoryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for InMemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> StationCache<V> for InMemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl<V> StationCache<V> for NoopCache {
    fn get(&self, _key: &str) -> Option<V> {
        None
    }

    fn set(&self, _key: String, _value: V) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_cache() {
        let cache = InMemoryCache::new();
        assert!(cache.is_empty());

        cache.set("k".to_string(), 1);
        cache.set("k".to_string(), 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_noop_cache_stores_nothing() {
        let cache = NoopCache;
        StationCache::<u32>::set(&cache, "k".to_string(), 1);
        assert_eq!(StationCache::<u32>::get(&cache, "k"), None);
    }
}
