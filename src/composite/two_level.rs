//! Two-Level Cache
//!
//! A small fast L1 in front of a larger L2, with an optional loader behind
//! both. Read-through with L1 backfill, write-through to both tiers.

use std::fmt;

use super::{require, Tier, TierChain, TierStatsSnapshot};
use crate::cache::{Cache, Loader, SharedCache};
use crate::error::Result;

/// L1 + L2 composite cache
pub struct TwoLevelCache<K, V> {
    chain: TierChain<K, V>,
}

/// Builder for [`TwoLevelCache`]; both tiers are required
pub struct TwoLevelCacheBuilder<K, V> {
    level1: Option<SharedCache<K, V>>,
    level2: Option<SharedCache<K, V>>,
    loader: Option<Loader<K, V>>,
}

impl<K, V> TwoLevelCacheBuilder<K, V>
where
    K: Clone,
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

    /// Build the cache, failing if a tier is missing
    pub fn build(self) -> Result<TwoLevelCache<K, V>> {
        let level1 = require(self.level1, Tier::L1)?;
        let level2 = require(self.level2, Tier::L2)?;
        Ok(TwoLevelCache {
            chain: TierChain::new(vec![level1, level2], self.loader),
        })
    }
}

impl<K, V> TwoLevelCache<K, V>
where
    K: Clone,
    V: Clone,
{
    pub fn builder() -> TwoLevelCacheBuilder<K, V> {
        TwoLevelCacheBuilder {
            level1: None,
            level2: None,
            loader: None,
        }
    }

    /// Create a cache without a loader
    pub fn new(level1: SharedCache<K, V>, level2: SharedCache<K, V>) -> Self {
        Self {
            chain: TierChain::new(vec![level1, level2], None),
        }
    }

    /// Create a cache that loads keys missing from both tiers
    pub fn with_loader(
        level1: SharedCache<K, V>,
        level2: SharedCache<K, V>,
        loader: Loader<K, V>,
    ) -> Self {
        Self {
            chain: TierChain::new(vec![level1, level2], Some(loader)),
        }
    }

    pub fn level1(&self) -> Option<&SharedCache<K, V>> {
        self.chain.tier(Tier::L1)
    }

    pub fn level2(&self) -> Option<&SharedCache<K, V>> {
        self.chain.tier(Tier::L2)
    }

    /// Copy L2 values into L1 for the given keys. Keys missing from L2 are
    /// skipped. Returns the number of keys copied.
    pub fn preload_to_l1<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
    {
        self.chain.preload(keys)
    }

    /// Move a key out of L1, making sure L2 holds its latest value
    pub fn demote_to_l2(&self, key: &K) -> Result<bool> {
        self.chain.demote(key)
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

    pub fn l2_hit_rate(&self) -> f64 {
        self.chain.metrics().hit_rate(Tier::L2)
    }

    /// L1 plus L2 hits over total reads
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

impl<K, V> Cache<K, V> for TwoLevelCache<K, V>
where
    K: Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.chain.write_through(key, value)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        self.chain.lookup(key)
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.chain.remove_all(key)
    }

    fn clear(&self) -> Result<()> {
        self.chain.clear_all()
    }

    /// L2's size; every resident key is in L2
    fn size(&self) -> usize {
        self.chain.size()
    }
}

impl<K, V> fmt::Display for TwoLevelCache<K, V>
where
    K: Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TwoLevelCache Stats: {}", self.stats_snapshot())
    }
}

impl<K, V> fmt::Debug for TwoLevelCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoLevelCache")
            .field("chain", &self.chain)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
