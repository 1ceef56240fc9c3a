//! Segment-Locked Two-Level Cache
//!
//! Same contract as [`TwoLevelCache`](super::TwoLevelCache), hardened for
//! concurrent access.
//!
//! # Design
//!
//! - L1 hits are served without any lock
//! - An L1 miss takes the key's segment lock and re-checks L1 before going to
//!   L2 or the loader, so concurrent misses on one key load it at most once
//! - `put` and `remove` hold the segment lock across both tiers
//! - `clear` takes every segment lock in ascending order, then resets metrics
//! - Segment locks are reentrant, so a loader may read or write other keys of
//!   the same cache from inside a load

use std::fmt;
use std::hash::Hash;

use tracing::debug;

use super::{require, Tier, TierChain, TierStatsSnapshot};
use crate::cache::{Cache, Loader, SegmentLocks, SharedCache, DEFAULT_SEGMENT_COUNT};
use crate::error::Result;

/// Segmented cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentedConfig {
    /// Number of independent segment locks
    pub segment_count: usize,
}

impl Default for SegmentedConfig {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
        }
    }
}

/// Two-level cache with per-key segment locking and single-flight loads
pub struct SegmentedTwoLevelCache<K, V> {
    chain: TierChain<K, V>,
    locks: SegmentLocks,
}

/// Builder for [`SegmentedTwoLevelCache`]
pub struct SegmentedTwoLevelCacheBuilder<K, V> {
    level1: Option<SharedCache<K, V>>,
    level2: Option<SharedCache<K, V>>,
    loader: Option<Loader<K, V>>,
    config: SegmentedConfig,
}

impl<K, V> SegmentedTwoLevelCacheBuilder<K, V>
where
    K: Hash + Clone,
    V: Clone,
{
    pub fn level1(mut self, cache: SharedCache<K, V>) -> Self {
        self.level1 = Some(cache);
        self
    }

    pub fn level2(mut self, cache: SharedCache<K, V>) -> Self {
        self.level2 = Some(cache);
        self
    }

    pub fn loader(mut self, loader: Loader<K, V>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn segment_count(mut self, count: usize) -> Self {
        self.config.segment_count = count;
        self
    }

    pub fn config(mut self, config: SegmentedConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the cache, failing on a missing tier or a zero segment count
    pub fn build(self) -> Result<SegmentedTwoLevelCache<K, V>> {
        let level1 = require(self.level1, Tier::L1)?;
        let level2 = require(self.level2, Tier::L2)?;
        let locks = SegmentLocks::new(self.config.segment_count)?;

        debug!(
            segments = locks.len(),
            loader = self.loader.is_some(),
            "Segmented two-level cache created"
        );

        Ok(SegmentedTwoLevelCache {
            chain: TierChain::new(vec![level1, level2], self.loader),
            locks,
        })
    }
}

impl<K, V> SegmentedTwoLevelCache<K, V>
where
    K: Hash + Clone,
    V: Clone,
{
    pub fn builder() -> SegmentedTwoLevelCacheBuilder<K, V> {
        SegmentedTwoLevelCacheBuilder {
            level1: None,
            level2: None,
            loader: None,
            config: SegmentedConfig::default(),
        }
    }

    /// Create a cache with the default segment count
    pub fn new(
        level1: SharedCache<K, V>,
        level2: SharedCache<K, V>,
        loader: Option<Loader<K, V>>,
    ) -> Result<Self> {
        Self::with_config(level1, level2, loader, SegmentedConfig::default())
    }

    pub fn with_config(
        level1: SharedCache<K, V>,
        level2: SharedCache<K, V>,
        loader: Option<Loader<K, V>>,
        config: SegmentedConfig,
    ) -> Result<Self> {
        let builder = Self::builder().level1(level1).level2(level2).config(config);
        match loader {
            Some(loader) => builder.loader(loader).build(),
            None => builder.build(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.locks.len()
    }

    pub fn level1(&self) -> Option<&SharedCache<K, V>> {
        self.chain.tier(Tier::L1)
    }

    pub fn level2(&self) -> Option<&SharedCache<K, V>> {
        self.chain.tier(Tier::L2)
    }

    pub fn l1_hit_count(&self) -> u64 {
        self.chain.metrics().hits(Tier::L1)
    }

    pub fn l2_hit_count(&self) -> u64 {
        self.chain.metrics().hits(Tier::L2)
    }

    pub fn loader_call_count(&self) -> u64 {
        self.chain.metrics().loader_calls()
    }

    pub fn total_read_count(&self) -> u64 {
        self.chain.metrics().total_reads()
    }

    pub fn l1_hit_rate(&self) -> f64 {
        self.chain.metrics().hit_rate(Tier::L1)
    }

    pub fn overall_hit_rate(&self) -> f64 {
        self.chain.metrics().overall_hit_rate()
    }

    pub fn reset_stats(&self) {
        self.chain.metrics().reset();
    }

    pub fn stats_snapshot(&self) -> TierStatsSnapshot {
        self.chain.metrics().snapshot()
    }

    pub fn stats_summary(&self) -> String {
        self.to_string()
    }
}

impl<K, V> Cache<K, V> for SegmentedTwoLevelCache<K, V>
where
    K: Hash + Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        let _segment = self.locks.lock(&key);
        self.chain.write_through(key, value)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        let metrics = self.chain.metrics();
        metrics.record_read();

        if let Some(level1) = self.chain.tier(Tier::L1) {
            if let Some(value) = level1.get(key)? {
                metrics.record_hit(Tier::L1);
                return Ok(Some(value));
            }
        }

        // Losers of a concurrent miss find the winner's backfill in L1 here
        let _segment = self.locks.lock(key);
        self.chain.resolve(key)
    }

    fn remove(&self, key: &K) -> Result<()> {
        let _segment = self.locks.lock(key);
        self.chain.remove_all(key)
    }

    fn clear(&self) -> Result<()> {
        let _segments = self.locks.lock_all();
        self.chain.clear_all()?;
        self.chain.metrics().reset();
        Ok(())
    }

    fn size(&self) -> usize {
        self.chain.size()
    }
}

impl<K, V> fmt::Display for SegmentedTwoLevelCache<K, V>
where
    K: Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentedTwoLevelCache Stats: {}, segments={}",
            self.stats_snapshot(),
            self.locks.len()
        )
    }
}

impl<K, V> fmt::Debug for SegmentedTwoLevelCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedTwoLevelCache")
            .field("chain", &self.chain)
            .field("locks", &self.locks)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{loader, LruCache};
    use crate::error::Error;
    use crate::store::ConcurrentCache;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier, OnceLock, Weak};
    use std::thread;
    use std::time::Duration;

    fn tiers() -> (SharedCache<String, String>, SharedCache<String, String>) {
        (
            Arc::new(LruCache::<String, String>::new(64).unwrap()),
            Arc::new(ConcurrentCache::<String, String>::new()),
        )
    }

    fn slow_counting_loader(calls: Arc<AtomicUsize>) -> Loader<String, String> {
        loader(move |k: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Some(format!("loaded:{}", k)))
        })
    }

    #[test]
    fn test_zero_segments_rejected() {
        let (l1, l2) = tiers();
        let result = SegmentedTwoLevelCache::builder()
            .level1(l1)
            .level2(l2)
            .segment_count(0)
            .build();
        assert_matches!(result, Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_tier_rejected() {
        let (l1, _) = tiers();
        let result = SegmentedTwoLevelCache::builder().level1(l1).build();
        assert_matches!(result, Err(Error::InvalidConfig(msg)) if msg.contains("L2"));
    }

    #[test]
    fn test_default_segment_count() {
        let (l1, l2) = tiers();
        let cache = SegmentedTwoLevelCache::new(l1, l2, None).unwrap();
        assert_eq!(cache.segment_count(), 16);
    }

    #[test]
    fn test_single_flight_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (l1, l2) = tiers();
        let cache = Arc::new(
            SegmentedTwoLevelCache::new(l1, l2, Some(slow_counting_loader(calls.clone()))).unwrap(),
        );

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&"shared".to_string()).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some("loaded:shared".to_string()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loader_call_count(), 1);
        assert_eq!(cache.total_read_count(), threads as u64);
        // Every read but the loading one was an L1 hit
        assert_eq!(cache.l1_hit_count(), threads as u64 - 1);
    }

    #[test]
    fn test_loader_reads_key_in_same_segment() {
        let handle: Arc<OnceLock<Weak<SegmentedTwoLevelCache<u32, u32>>>> =
            Arc::new(OnceLock::new());
        let source = Arc::clone(&handle);
        let l1: SharedCache<u32, u32> = Arc::new(LruCache::<u32, u32>::new(8).unwrap());
        let l2: SharedCache<u32, u32> = Arc::new(ConcurrentCache::<u32, u32>::new());

        let cache = Arc::new(
            SegmentedTwoLevelCache::builder()
                .level1(l1)
                .level2(l2)
                .loader(loader(move |k: &u32| {
                    if *k != 1 {
                        return Ok(Some(k * 10));
                    }
                    let cache = source
                        .get()
                        .and_then(Weak::upgrade)
                        .ok_or_else(|| Error::Load("cache dropped".to_string()))?;
                    Ok(cache.get(&2)?.map(|v| v + 1))
                }))
                .segment_count(1)
                .build()
                .unwrap(),
        );
        assert!(handle.set(Arc::downgrade(&cache)).is_ok());

        // A self-deadlock would never send
        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&cache);
        thread::spawn(move || {
            let _ = tx.send(worker.get(&1));
        });
        let loaded = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("get(1) blocked on its own segment");

        assert_eq!(loaded.unwrap(), Some(21));
        assert_eq!(cache.get(&2).unwrap(), Some(20));
        assert_eq!(cache.loader_call_count(), 2);
    }

    #[test]
    fn test_distinct_keys_load_independently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (l1, l2) = tiers();
        let cache = Arc::new(
            SegmentedTwoLevelCache::new(l1, l2, Some(slow_counting_loader(calls.clone()))).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(&format!("k{}", i)).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(cache.size(), 8);
    }

    #[test]
    fn test_put_get_remove() {
        let (l1, l2) = tiers();
        let cache = SegmentedTwoLevelCache::new(l1.clone(), l2.clone(), None).unwrap();

        cache.put("a".into(), "1".into()).unwrap();
        assert_eq!(l1.get(&"a".into()).unwrap(), Some("1".to_string()));
        assert_eq!(l2.get(&"a".into()).unwrap(), Some("1".to_string()));

        l1.remove(&"a".into()).unwrap();
        assert_eq!(cache.get(&"a".into()).unwrap(), Some("1".to_string()));
        assert_eq!(cache.l2_hit_count(), 1);

        cache.remove(&"a".into()).unwrap();
        assert_eq!(cache.get(&"a".into()).unwrap(), None);
    }

    #[test]
    fn test_clear_resets_stats() {
        let (l1, l2) = tiers();
        let cache = SegmentedTwoLevelCache::with_config(
            l1,
            l2,
            None,
            SegmentedConfig { segment_count: 4 },
        )
        .unwrap();
        cache.put("a".into(), "1".into()).unwrap();
        cache.get(&"a".into()).unwrap();

        cache.clear().unwrap();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.total_read_count(), 0);
        assert!(cache.stats_summary().ends_with("segments=4"));
    }

    #[test]
    fn test_concurrent_writers_and_clear() {
        let (l1, l2) = tiers();
        let cache = Arc::new(SegmentedTwoLevelCache::new(l1, l2, None).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("{}-{}", t, i);
                        cache.put(key.clone(), key.clone()).unwrap();
                        if i % 50 == 0 {
                            cache.clear().unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.size() <= 800);

        cache.clear().unwrap();
        assert!(cache.level1().is_some_and(|l1| l1.is_empty()));
        assert_eq!(cache.size(), 0);
    }
}
