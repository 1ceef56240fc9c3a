//! Statistics Decorator
//!
//! Counts hits, misses, puts and removes and accumulates time spent in `get`
//! and `put` of the wrapped cache.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::LatencyTracker;
use crate::cache::Cache;
use crate::error::Result;

/// Cache wrapper collecting access statistics
#[derive(Debug)]
pub struct StatsCache<C> {
    inner: C,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    get_nanos: AtomicU64,
    put_nanos: AtomicU64,
}

impl<C> StatsCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            get_nanos: AtomicU64::new(0),
            put_nanos: AtomicU64::new(0),
        }
    }

    /// Get the wrapped cache
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits plus misses
    pub fn total_access_count(&self) -> u64 {
        self.hit_count() + self.miss_count()
    }

    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn remove_count(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Hits over total accesses (0.0 before any access)
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hit_count(), self.total_access_count())
    }

    /// Mean nanoseconds per successful `get`
    pub fn average_get_nanos(&self) -> f64 {
        ratio(
            self.get_nanos.load(Ordering::Relaxed),
            self.total_access_count(),
        )
    }

    /// Mean nanoseconds per successful `put`
    pub fn average_put_nanos(&self) -> f64 {
        ratio(self.put_nanos.load(Ordering::Relaxed), self.put_count())
    }

    /// Reset all statistics
    pub fn reset_stats(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.puts,
            &self.removes,
            &self.get_nanos,
            &self.put_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all statistics
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hit_count(),
            misses: self.miss_count(),
            hit_rate: self.hit_rate(),
            puts: self.put_count(),
            removes: self.remove_count(),
            avg_get_nanos: self.average_get_nanos(),
            avg_put_nanos: self.average_put_nanos(),
        }
    }

    pub fn stats_summary(&self) -> String {
        self.snapshot().to_string()
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl<K, V, C> Cache<K, V> for StatsCache<C>
where
    C: Cache<K, V>,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        let tracker = LatencyTracker::start();
        let result = self.inner.put(key, value);
        if result.is_ok() {
            self.put_nanos
                .fetch_add(tracker.elapsed_nanos(), Ordering::Relaxed);
            self.puts.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        let tracker = LatencyTracker::start();
        let result = self.inner.get(key);
        let counter = match result {
            Ok(Some(_)) => &self.hits,
            Ok(None) => &self.misses,
            Err(_) => return result,
        };
        self.get_nanos
            .fetch_add(tracker.elapsed_nanos(), Ordering::Relaxed);
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.inner.remove(key)?;
        self.removes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn stats(&self) -> Option<StatsSnapshot> {
        Some(self.snapshot())
    }
}

impl<C> fmt::Display for StatsCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of a [`StatsCache`]'s counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub puts: u64,
    pub removes: u64,
    pub avg_get_nanos: f64,
    pub avg_put_nanos: f64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache Stats: hits={}, misses={}, hitRate={:.2}%, avgGetTime={:.2}ns, \
             avgPutTime={:.2}ns, puts={}, removes={}",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.avg_get_nanos,
            self.avg_put_nanos,
            self.puts,
            self.removes
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
