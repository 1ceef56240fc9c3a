//! Property-Based Tests for the LRU Map
//!
//! Drives [`LruMap`] with random operation sequences and compares it against
//! a straightforward recency-list model.
//!
//! # Test Properties
//!
//! 1. **Bounded**: `len() <= capacity` after every operation
//! 2. **Eviction Order**: the evicted key is always the least recently touched
//! 3. **Agreement**: reads return exactly what the model holds

#![cfg(test)]

use std::collections::VecDeque;

use proptest::prelude::*;

use super::lru::LruMap;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
}

/// Small key space so hits, overwrites and evictions all happen often.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..12, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..12).prop_map(Op::Get),
        (0u8..12).prop_map(Op::Remove),
    ]
}

/// Reference model: front is most recently used.
struct Model {
    capacity: usize,
    order: VecDeque<(u8, u32)>,
}

impl Model {
    fn position(&self, key: u8) -> Option<usize> {
        self.order.iter().position(|(k, _)| *k == key)
    }

    fn get(&mut self, key: u8) -> Option<u32> {
        let pos = self.position(key)?;
        let entry = self.order.remove(pos)?;
        self.order.push_front(entry);
        Some(entry.1)
    }

    fn put(&mut self, key: u8, value: u32) -> Option<(u8, u32)> {
        if let Some(pos) = self.position(key) {
            self.order.remove(pos);
            self.order.push_front((key, value));
            return None;
        }
        let evicted = if self.order.len() == self.capacity {
            self.order.pop_back()
        } else {
            None
        };
        self.order.push_front((key, value));
        evicted
    }

    fn remove(&mut self, key: u8) -> Option<u32> {
        let pos = self.position(key)?;
        self.order.remove(pos).map(|(_, v)| v)
    }
}

// =============================================================================
// Model Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The map behaves exactly like the model for any operation sequence.
    #[test]
    fn prop_matches_model(
        capacity in 1usize..=6,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut map = LruMap::new(capacity).unwrap();
        let mut model = Model { capacity, order: VecDeque::new() };

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    prop_assert_eq!(map.insert(k, v), model.put(k, v));
                }
                Op::Get(k) => {
                    prop_assert_eq!(map.get(&k).copied(), model.get(k));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(map.remove(&k), model.remove(k));
                }
            }

            prop_assert!(map.len() <= capacity);
            prop_assert_eq!(map.len(), model.order.len());
            prop_assert_eq!(map.lru_key().copied(), model.order.back().map(|(k, _)| *k));
            prop_assert_eq!(map.mru_key().copied(), model.order.front().map(|(k, _)| *k));
        }

        let recency: Vec<(u8, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u8, u32)> = model.order.iter().copied().collect();
        prop_assert_eq!(recency, expected);
    }

    /// Distinct inserts beyond capacity evict in insertion order.
    #[test]
    fn prop_distinct_inserts_evict_fifo(capacity in 1usize..=16, extra in 1usize..=16) {
        let mut map = LruMap::new(capacity).unwrap();
        let total = capacity + extra;
        let mut evicted = Vec::new();

        for k in 0..total {
            if let Some((key, _)) = map.insert(k, ()) {
                evicted.push(key);
            }
        }

        prop_assert_eq!(map.len(), capacity);
        prop_assert_eq!(evicted, (0..extra).collect::<Vec<_>>());
    }
}
