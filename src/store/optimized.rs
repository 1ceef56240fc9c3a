//! Optimized Concurrent Store
//!
//! A sharded map with striped access counters and an optional loader.
//!
//! # Design
//!
//! - Hit, miss and load counters are [`StripedCounter`]s, so hot-path
//!   increments from many threads land on different cache lines
//! - Loads run inside the map's entry API: the vacant entry holds its shard
//!   lock while the loader runs, so a key is loaded at most once even when
//!   many threads miss it together
//! - Loaders must not call back into the same cache

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::{Cache, Loader, StripedCounter};
use crate::error::{Error, Result};

/// Concurrent store with striped counters and single-flight loading
pub struct OptimizedConcurrentCache<K, V> {
    map: DashMap<K, V>,
    loader: Option<Loader<K, V>>,
    hits: StripedCounter,
    misses: StripedCounter,
    loads: StripedCounter,
}

impl<K, V> OptimizedConcurrentCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a store without a loader
    pub fn new() -> Self {
        Self::build(DEFAULT_INITIAL_CAPACITY, None)
    }

    /// Create a store that loads missing keys through `loader`
    pub fn with_loader(loader: Loader<K, V>) -> Self {
        Self::build(DEFAULT_INITIAL_CAPACITY, Some(loader))
    }

    pub fn with_capacity(capacity: usize, loader: Option<Loader<K, V>>) -> Self {
        Self::build(capacity, loader)
    }

    fn build(capacity: usize, loader: Option<Loader<K, V>>) -> Self {
        Self {
            map: DashMap::with_capacity(capacity),
            loader,
            hits: StripedCounter::default(),
            misses: StripedCounter::default(),
            loads: StripedCounter::default(),
        }
    }

    /// Check if a loader is configured
    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Insert only if absent, returning the existing value otherwise
    pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        match self.map.entry(key) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Atomically recompute the value for `key`.
    ///
    /// `remap` sees the current value (if any); returning `None` removes the
    /// key. The shard stays locked for the duration of the call.
    pub fn compute<F>(&self, key: K, remap: F) -> Option<V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        match self.map.entry(key) {
            Entry::Occupied(mut entry) => match remap(entry.key(), Some(entry.get())) {
                Some(value) => {
                    entry.insert(value.clone());
                    Some(value)
                }
                None => {
                    entry.remove();
                    None
                }
            },
            Entry::Vacant(entry) => {
                let value = remap(entry.key(), None)?;
                entry.insert(value.clone());
                Some(value)
            }
        }
    }

    /// Remove `key` only while it still maps to `expected`
    pub fn remove_if_eq(&self, key: &K, expected: &V) -> bool
    where
        V: PartialEq,
    {
        self.map
            .remove_if(key, |_, current| current == expected)
            .is_some()
    }

    /// Load every key that is not cached yet, returning how many were loaded.
    ///
    /// Requires a loader.
    pub fn warm_up<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
    {
        let loader = self.loader.as_ref().ok_or(Error::NoLoader)?;

        let mut loaded = 0;
        for key in keys {
            if let Entry::Vacant(entry) = self.map.entry(key) {
                self.loads.increment();
                if let Some(value) = loader(entry.key())? {
                    entry.insert(value);
                    loaded += 1;
                }
            }
        }

        debug!(loaded, size = self.map.len(), "Cache warmed up");
        Ok(loaded)
    }

    /// Get hit count
    pub fn hit_count(&self) -> u64 {
        self.hits.sum()
    }

    /// Get miss count
    pub fn miss_count(&self) -> u64 {
        self.misses.sum()
    }

    /// Get loader invocation count
    pub fn load_count(&self) -> u64 {
        self.loads.sum()
    }

    /// Hits over hits plus misses (0.0 before any read)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.sum();
        let total = hits + self.misses.sum();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Zero all counters
    pub fn reset_stats(&self) {
        self.hits.reset();
        self.misses.reset();
        self.loads.reset();
    }

    /// Debug summary of the underlying map
    pub fn internal_stats(&self) -> String {
        format!(
            "size={}, capacity={}, loads={}",
            self.map.len(),
            self.map.capacity(),
            self.loads.sum()
        )
    }

    fn load(&self, key: &K, loader: &Loader<K, V>) -> Result<Option<V>> {
        match self.map.entry(key.clone()) {
            // Another thread finished loading while we were waiting for the shard
            Entry::Occupied(entry) => Ok(Some(entry.get().clone())),
            Entry::Vacant(entry) => {
                self.loads.increment();
                match loader(key)? {
                    Some(value) => {
                        entry.insert(value.clone());
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

impl<K, V> Default for OptimizedConcurrentCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for OptimizedConcurrentCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.map.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.map.get(key) {
            self.hits.increment();
            return Ok(Some(value.value().clone()));
        }

        self.misses.increment();
        match &self.loader {
            Some(loader) => self.load(key, loader),
            None => Ok(None),
        }
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    /// Clears entries only; counters survive
    fn clear(&self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.len()
    }
}

impl<K, V> std::fmt::Debug for OptimizedConcurrentCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizedConcurrentCache")
            .field("len", &self.map.len())
            .field("has_loader", &self.loader.is_some())
            .field("hits", &self.hits.sum())
            .field("misses", &self.misses.sum())
            .field("loads", &self.loads.sum())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::loader;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn counting_loader(calls: Arc<AtomicUsize>) -> Loader<u32, String> {
        loader(move |k: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            if *k == 0 {
                Ok(None)
            } else {
                Ok(Some(format!("loaded-{}", k)))
            }
        })
    }

    #[test]
    fn test_counters_without_loader() {
        let cache = OptimizedConcurrentCache::new();
        cache.put("a", 1).unwrap();

        assert_eq!(cache.get(&"a").unwrap(), Some(1));
        assert_eq!(cache.get(&"b").unwrap(), None);
        assert_eq!(cache.get(&"a").unwrap(), Some(1));

        assert_eq!(cache.hit_count(), 2);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.load_count(), 0);
        assert!((cache.hit_rate() - 2.0 / 3.0).abs() < 1e-9);

        cache.reset_stats();
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn test_loader_fills_and_counts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = OptimizedConcurrentCache::with_loader(counting_loader(calls.clone()));

        assert_eq!(cache.get(&7).unwrap(), Some("loaded-7".to_string()));
        assert_eq!(cache.get(&7).unwrap(), Some("loaded-7".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);

        // Absent upstream: nothing cached
        assert_eq!(cache.get(&0).unwrap(), None);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_loader_error_propagates_and_caches_nothing() {
        let cache: OptimizedConcurrentCache<u32, u32> =
            OptimizedConcurrentCache::with_loader(loader(|_: &u32| Err(Error::Load("backend down".into()))));

        assert_matches!(cache.get(&1), Err(Error::Load(msg)) if msg == "backend down");
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_single_flight_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(OptimizedConcurrentCache::with_loader(counting_loader(
            calls.clone(),
        )));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&99).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some("loaded-99".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compute() {
        let cache = OptimizedConcurrentCache::new();
        assert_eq!(cache.compute("n", |_, v| Some(v.copied().unwrap_or(0) + 1)), Some(1));
        assert_eq!(cache.compute("n", |_, v| Some(v.copied().unwrap_or(0) + 1)), Some(2));
        assert_eq!(cache.compute("n", |_, _| None), None);
        assert_eq!(cache.get(&"n").unwrap(), None);
        assert_eq!(cache.compute("m", |_, _| None::<u32>), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_put_if_absent_and_remove_if_eq() {
        let cache = OptimizedConcurrentCache::new();
        assert_eq!(cache.put_if_absent("k", 1), None);
        assert_eq!(cache.put_if_absent("k", 2), Some(1));

        assert!(!cache.remove_if_eq(&"k", &2));
        assert!(cache.remove_if_eq(&"k", &1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_warm_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = OptimizedConcurrentCache::with_loader(counting_loader(calls.clone()));
        cache.put(1, "existing".to_string()).unwrap();

        let loaded = cache.warm_up(vec![0, 1, 2, 3]).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.get(&1).unwrap(), Some("existing".to_string()));
        // Key 1 was never sent to the loader
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.internal_stats().starts_with("size=3"));
    }

    #[test]
    fn test_warm_up_requires_loader() {
        let cache = OptimizedConcurrentCache::<u32, u32>::new();
        assert!(!cache.has_loader());
        assert_matches!(cache.warm_up(vec![1, 2]), Err(Error::NoLoader));
    }
}
