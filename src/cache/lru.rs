//! LRU Cache - Fixed-Capacity Recency-Ordered Cache
//!
//! # Design
//!
//! - [`LruMap`]: intrusive doubly-linked list over an arena of slots, plus a
//!   hash index from key to slot handle. Handles are stable `usize` indices,
//!   so unlink/relink on every access is O(1) without owning pointers.
//! - Freed slots are recycled through a free list.
//! - [`LruCache`]: the map behind a `parking_lot::Mutex`. Every `get` mutates
//!   the recency order, so a reader/writer lock would buy nothing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use super::Cache;
use crate::error::{Error, Result};

/// Sentinel handle for "no node"
const NIL: usize = usize::MAX;

/// Upper bound on slots reserved up front for very large capacities
const PREALLOC_LIMIT: usize = 4096;

struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Recency-ordered map with a fixed capacity.
///
/// The head of the list is the most recently used entry, the tail the least
/// recently used one.
pub struct LruMap<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty map holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "LRU capacity must be greater than 0".to_string(),
            ));
        }

        let reserve = capacity.min(PREALLOC_LIMIT);
        Ok(Self {
            slots: Vec::with_capacity(reserve),
            free: Vec::new(),
            index: HashMap::with_capacity(reserve),
            head: NIL,
            tail: NIL,
            capacity,
        })
    }

    /// Maximum number of entries
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the map is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Get a value without changing the recency order
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Check if a key is present without changing the recency order
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or overwrite a value and mark it most recently used.
    ///
    /// Returns the evicted entry when a new key arrives at full capacity.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.slots[idx].as_mut() {
                node.value = value;
            }
            self.touch(idx);
            return None;
        }

        // Make room before linking the new node
        let evicted = if self.index.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.push_front(idx);
        self.index.insert(key, idx);
        evicted
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        self.release(idx).map(|(_, value)| value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        if self.tail == NIL {
            return None;
        }
        self.release(self.tail)
    }

    /// Least recently used key (next eviction victim)
    pub fn lru_key(&self) -> Option<&K> {
        self.slots.get(self.tail)?.as_ref().map(|node| &node.key)
    }

    /// Most recently used key
    pub fn mru_key(&self) -> Option<&K> {
        self.slots.get(self.head)?.as_ref().map(|node| &node.key)
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            cursor: self.head,
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.index.remove(&node.key);
        Some((node.key, node.value))
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        if prev == NIL {
            self.head = next;
        } else if let Some(node) = self.slots[prev].as_mut() {
            node.next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else if let Some(node) = self.slots[next].as_mut() {
            node.prev = prev;
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = NIL;
            node.next = NIL;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = NIL;
            node.next = old_head;
        }

        if old_head == NIL {
            self.tail = idx;
        } else if let Some(node) = self.slots[old_head].as_mut() {
            node.prev = idx;
        }

        self.head = idx;
    }
}

/// Iterator over an [`LruMap`] from most to least recently used
pub struct Iter<'a, K, V> {
    map: &'a LruMap<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.map;
        let node = map.slots.get(self.cursor)?.as_ref()?;
        self.cursor = node.next;
        Some((&node.key, &node.value))
    }
}

/// Thread-safe LRU cache
pub struct LruCache<K, V> {
    map: Mutex<LruMap<K, V>>,
    evictions: AtomicU64,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            map: Mutex::new(LruMap::new(capacity)?),
            evictions: AtomicU64::new(0),
        })
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.map.lock().capacity()
    }

    /// Least recently used key, without touching the order
    pub fn eldest_key(&self) -> Option<K> {
        self.map.lock().lru_key().cloned()
    }

    /// Check if a key is present, without touching the order
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.lock().contains_key(key)
    }

    /// Read a value without touching the order
    pub fn peek(&self, key: &K) -> Option<V> {
        self.map.lock().peek(key).cloned()
    }

    /// Keys ordered from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.map.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        let mut map = self.map.lock();
        if map.insert(key, value).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(capacity = map.capacity(), "evicted least recently used entry");
        }
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

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.map.lock();
        f.debug_struct("LruCache")
            .field("capacity", &map.capacity)
            .field("len", &map.index.len())
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
