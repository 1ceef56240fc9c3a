//! Sharded Concurrency Primitives
//!
//! Segment lock tables and striped counters, the two building blocks for
//! spreading contention across independent cache lines.
//!
//! # Design
//!
//! - Each segment/stripe is wrapped in `CachePadded` to prevent false sharing
//! - Keys map to segments by `hash(key) % segment_count`, deterministic for
//!   the lifetime of the table
//! - Multi-segment acquisition always proceeds in ascending index order
//! - Segment locks are reentrant: a thread already holding a segment may
//!   lock it again

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{Error, Result};

/// Fixed-size table of independent locks partitioning a key space
pub struct SegmentLocks {
    segments: Box<[CachePadded<ReentrantMutex<()>>]>,
}

impl SegmentLocks {
    /// Create a table with `count` segments
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidConfig(
                "segment count must be greater than 0".to_string(),
            ));
        }

        let segments = (0..count)
            .map(|_| CachePadded::new(ReentrantMutex::new(())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self { segments })
    }

    /// Get the segment count
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A table always has at least one segment
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment index guarding `key`
    #[inline]
    pub fn index_of<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.segments.len() as u64) as usize
    }

    /// Lock the segment guarding `key`
    pub fn lock<Q>(&self, key: &Q) -> ReentrantMutexGuard<'_, ()>
    where
        Q: Hash + ?Sized,
    {
        self.segments[self.index_of(key)].lock()
    }

    /// Lock one segment by index
    pub fn lock_segment(&self, index: usize) -> ReentrantMutexGuard<'_, ()> {
        self.segments[index % self.segments.len()].lock()
    }

    /// Lock every segment in ascending index order.
    ///
    /// Guards are released when the returned vector is dropped.
    pub fn lock_all(&self) -> Vec<ReentrantMutexGuard<'_, ()>> {
        self.segments.iter().map(|segment| segment.lock()).collect()
    }
}

impl std::fmt::Debug for SegmentLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentLocks")
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Global source of per-thread stripe hints
static NEXT_STRIPE_HINT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static STRIPE_HINT: Cell<usize> = Cell::new(NEXT_STRIPE_HINT.fetch_add(1, Ordering::Relaxed));
}

/// Counter split across cache-padded stripes.
///
/// Each thread increments its own stripe; `sum()` adds all stripes. Every
/// stripe is individually atomic, so a read is never torn, but a sum taken
/// during concurrent increments is only a point-in-time estimate.
pub struct StripedCounter {
    stripes: Box<[CachePadded<AtomicU64>]>,
}

impl StripedCounter {
    /// Create a counter with `stripes` cells (rounded up to a power of two)
    pub fn new(stripes: usize) -> Self {
        let count = stripes.max(1).next_power_of_two();
        let stripes = (0..count)
            .map(|_| CachePadded::new(AtomicU64::new(0)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { stripes }
    }

    /// Number of stripes
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    #[inline]
    fn stripe(&self) -> &AtomicU64 {
        let hint = STRIPE_HINT.with(Cell::get);
        &self.stripes[hint & (self.stripes.len() - 1)]
    }

    /// Add `n`
    #[inline]
    pub fn add(&self, n: u64) {
        self.stripe().fetch_add(n, Ordering::Relaxed);
    }

    /// Add one
    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    /// Sum of all stripes
    pub fn sum(&self) -> u64 {
        self.stripes
            .iter()
            .map(|stripe| stripe.load(Ordering::Relaxed))
            .sum()
    }

    /// Zero every stripe
    pub fn reset(&self) {
        for stripe in self.stripes.iter() {
            stripe.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for StripedCounter {
    fn default() -> Self {
        Self::new(super::DEFAULT_COUNTER_STRIPES)
    }
}

impl std::fmt::Debug for StripedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedCounter")
            .field("sum", &self.sum())
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_segments_rejected() {
        assert!(matches!(SegmentLocks::new(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_index_is_deterministic_and_in_range() {
        let locks = SegmentLocks::new(16).unwrap();
        assert_eq!(locks.len(), 16);
        assert!(!locks.is_empty());

        for i in 0..1000 {
            let key = format!("key-{}", i);
            let idx = locks.index_of(&key);
            assert!(idx < 16);
            assert_eq!(idx, locks.index_of(&key));
        }
    }

    #[test]
    fn test_index_is_stable_across_tables() {
        let a = SegmentLocks::new(8).unwrap();
        let b = SegmentLocks::new(8).unwrap();
        assert_eq!(a.index_of("same-key"), b.index_of("same-key"));
    }

    #[test]
    fn test_distribution() {
        let locks = SegmentLocks::new(16).unwrap();
        let mut counts = [0usize; 16];
        for i in 0..1600 {
            counts[locks.index_of(&i)] += 1;
        }

        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(max < 200, "Uneven distribution: max segment has {}", max);
        assert!(min > 50, "Uneven distribution: min segment has {}", min);
    }

    /// Which segments another thread could take right now
    fn free_from_other_thread(locks: &SegmentLocks) -> Vec<bool> {
        thread::scope(|scope| {
            scope
                .spawn(|| {
                    locks
                        .segments
                        .iter()
                        .map(|segment| segment.try_lock().is_some())
                        .collect()
                })
                .join()
                .unwrap()
        })
    }

    #[test]
    fn test_different_segments_do_not_contend() {
        let locks = SegmentLocks::new(4).unwrap();
        let _first = locks.lock_segment(0);
        assert_eq!(free_from_other_thread(&locks), vec![false, true, true, true]);
    }

    #[test]
    fn test_lock_all_holds_every_segment() {
        let locks = SegmentLocks::new(4).unwrap();
        let guards = locks.lock_all();
        assert_eq!(guards.len(), 4);
        assert!(free_from_other_thread(&locks).iter().all(|free| !free));
        drop(guards);
        assert!(free_from_other_thread(&locks).iter().all(|free| *free));
    }

    #[test]
    fn test_segment_lock_is_reentrant() {
        let locks = SegmentLocks::new(1).unwrap();
        let _outer = locks.lock("a");
        let _inner = locks.lock("b");
        let _all = locks.lock_all();
        assert_eq!(free_from_other_thread(&locks), vec![false]);
    }

    #[test]
    fn test_striped_counter_rounds_up() {
        assert_eq!(StripedCounter::new(0).stripe_count(), 1);
        assert_eq!(StripedCounter::new(5).stripe_count(), 8);
        assert_eq!(StripedCounter::default().stripe_count(), 16);
    }

    #[test]
    fn test_striped_counter_concurrent_sum() {
        let counter = Arc::new(StripedCounter::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.increment();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.sum(), 80_000);
        counter.reset();
        assert_eq!(counter.sum(), 0);
    }

    #[test]
    fn test_striped_counter_add() {
        let counter = StripedCounter::new(2);
        counter.add(40);
        counter.add(2);
        assert_eq!(counter.sum(), 42);
    }
}
