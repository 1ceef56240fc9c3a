//! Cache Capability and Core Tiers
//!
//! Every store, tier, composite and decorator in this crate implements the
//! same [`Cache`] capability, so tiers can be chained and wrapped freely.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Composite Caches                              │
//! │     TwoLevelCache  │  ThreeLevelCache  │  SegmentedTwoLevelCache      │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  L1 (small, fast)      │  L2 (larger)       │  L3 (largest)          │
//! │  ┌──────────────────┐  │  ┌──────────────┐  │  ┌──────────────────┐  │
//! │  │ LruCache         │  │  │ Expiring /   │  │  │ Concurrent /     │  │
//! │  │ (arena + list)   │  │  │ Concurrent   │  │  │ Optimized store  │  │
//! │  └──────────────────┘  │  └──────────────┘  │  └──────────────────┘  │
//! │          └────── read-through / backfill ───┴──────────┘              │
//! │          ◀───────────── write-through (deepest first) ──────────────  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - All operations take `&self`; each implementation owns its concurrency
//!   discipline (none, mutex, rwlock, sharded, segment locks)
//! - Fallible operations return [`crate::Result`] so loader and tier failures
//!   propagate unchanged through composites and decorators
//! - Background work (expiry sweep, monitoring) runs on an owned
//!   [`PeriodicTask`] that stops when its owner is dropped

mod clock;
mod entry;
mod expiring;
mod lru;
mod shard;
mod task;

#[cfg(test)]
mod proptest;

use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::ExpiringEntry;
pub use expiring::{ExpiringCache, ExpiringConfig};
pub use lru::{LruCache, LruMap};
pub use shard::{SegmentLocks, StripedCounter};
pub use task::PeriodicTask;

use crate::decorator::StatsSnapshot;
use crate::error::Result;

/// Default number of segment locks for segment-locked composites
pub const DEFAULT_SEGMENT_COUNT: usize = 16;

/// Default number of stripes for striped counters
pub const DEFAULT_COUNTER_STRIPES: usize = 16;

/// Default interval of the expiring cache's background sweep
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// The cache capability shared by every tier and decorator.
pub trait Cache<K, V> {
    /// Insert or overwrite a value
    fn put(&self, key: K, value: V) -> Result<()>;

    /// Look up a value, `None` when absent
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Remove a key (no-op when absent)
    fn remove(&self, key: &K) -> Result<()>;

    /// Remove every entry
    fn clear(&self) -> Result<()>;

    /// Number of entries currently held
    fn size(&self) -> usize;

    /// Check if the cache holds no entries
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Access statistics, if this cache collects them
    fn stats(&self) -> Option<StatsSnapshot> {
        None
    }
}

/// A thread-safe, shareable cache tier
pub type SharedCache<K, V> = Arc<dyn Cache<K, V> + Send + Sync>;

/// Value loader invoked when no tier holds a key.
///
/// `Ok(None)` means the key does not exist upstream; nothing is cached.
pub type Loader<K, V> = Arc<dyn Fn(&K) -> Result<Option<V>> + Send + Sync>;

impl<K, V, C> Cache<K, V> for Arc<C>
where
    C: Cache<K, V> + ?Sized,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        (**self).get(key)
    }

    fn remove(&self, key: &K) -> Result<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn stats(&self) -> Option<StatsSnapshot> {
        (**self).stats()
    }
}

impl<K, V, C> Cache<K, V> for Box<C>
where
    C: Cache<K, V> + ?Sized,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        (**self).get(key)
    }

    fn remove(&self, key: &K) -> Result<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn stats(&self) -> Option<StatsSnapshot> {
        (**self).stats()
    }
}

/// Wrap a closure as a [`Loader`]
pub fn loader<K, V, F>(f: F) -> Loader<K, V>
where
    F: Fn(&K) -> Result<Option<V>> + Send + Sync + 'static,
{
    Arc::new(f)
}

// =============================================================================
// Tests
// =============================================================================
