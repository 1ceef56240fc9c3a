//! Store guarded by a reader/writer lock.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::Cache;
use crate::error::Result;

/// Map store allowing concurrent readers
#[derive(Debug)]
pub struct RwLockCache<K, V> {
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> RwLockCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl<K, V> Default for RwLockCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for RwLockCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.map.write().insert(key, value);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map.write().clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.read().len()
    }
}
