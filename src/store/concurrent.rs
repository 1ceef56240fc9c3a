//! Lock-Striped Concurrent Store
//!
//! Backed by `DashMap`: reads and writes to different shards never contend,
//! and the atomic helpers run under the owning shard's lock.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::Cache;
use crate::error::Result;

/// Concurrent map store
pub struct ConcurrentCache<K, V> {
    map: DashMap<K, V>,
}

impl<K, V> ConcurrentCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity(capacity),
        }
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert only if absent.
    ///
    /// Returns the existing value when the key was already present.
    pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        match self.map.entry(key) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Overwrite only if present, returning the previous value
    pub fn replace(&self, key: K, value: V) -> Option<V> {
        match self.map.entry(key) {
            Entry::Occupied(mut entry) => Some(entry.insert(value)),
            Entry::Vacant(_) => None,
        }
    }

    /// Return the value for `key`, computing and storing it first if absent.
    ///
    /// `compute` runs at most once per absent key, under the shard lock; it
    /// must not access this cache.
    pub fn compute_if_absent<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.map.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let value = compute(entry.key());
                entry.insert(value).value().clone()
            }
        }
    }
}

impl<K, V> Default for ConcurrentCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for ConcurrentCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.map.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.map.get(key).map(|v| v.value().clone()))
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.len()
    }
}

impl<K, V> std::fmt::Debug for ConcurrentCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentCache")
            .field("len", &self.map.len())
            .finish()
    }
}
