//! Store guarded by a single mutex.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::Cache;
use crate::error::Result;

/// Map store where every operation holds one instance-wide lock
#[derive(Debug)]
pub struct SynchronizedCache<K, V> {
    map: Mutex<HashMap<K, V>>,
}

impl<K, V> SynchronizedCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl<K, V> Default for SynchronizedCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for SynchronizedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.map.lock().insert(key, value);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.map.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map.lock().clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.lock().len()
    }
}
