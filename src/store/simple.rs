//! Unsynchronized store for single-threaded use.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::Cache;
use crate::error::Result;

/// Plain map store.
///
/// Interior mutability through `RefCell` makes it `!Sync`, so it can never be
/// shared across threads.
#[derive(Debug)]
pub struct SimpleCache<K, V> {
    map: RefCell<HashMap<K, V>>,
}

impl<K, V> SimpleCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RefCell::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl<K, V> Default for SimpleCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for SimpleCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.map.borrow_mut().insert(key, value);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map.borrow_mut().clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.borrow().len()
    }
}
