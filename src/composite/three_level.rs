//! Three-Level Cache
//!
//! L1 → L2 → L3 chain with an optional loader. A value found in a deeper
//! tier is backfilled into every shallower tier before `get` returns.

use std::fmt;

use super::{require, Tier, TierChain, TierStatsSnapshot};
use crate::cache::{Cache, Loader, SharedCache};
use crate::error::Result;

/// L1 + L2 + L3 composite cache
pub struct ThreeLevelCache<K, V> {
    chain: TierChain<K, V>,
}

/// Builder for [`ThreeLevelCache`]; all three tiers are required
pub struct ThreeLevelCacheBuilder<K, V> {
    level1: Option<SharedCache<K, V>>,
    level2: Option<SharedCache<K, V>>,
    level3: Option<SharedCache<K, V>>,
    loader: Option<Loader<K, V>>,
}

impl<K, V> ThreeLevelCacheBuilder<K, V>
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

    pub fn level3(mut self, cache: SharedCache<K, V>) -> Self {
        self.level3 = Some(cache);
        self
    }

    pub fn loader(mut self, loader: Loader<K, V>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> Result<ThreeLevelCache<K, V>> {
        let tiers = vec![
            require(self.level1, Tier::L1)?,
            require(self.level2, Tier::L2)?,
            require(self.level3, Tier::L3)?,
        ];
        Ok(ThreeLevelCache {
            chain: TierChain::new(tiers, self.loader),
        })
    }
}

impl<K, V> ThreeLevelCache<K, V>
where
    K: Clone,
    V: Clone,
{
    pub fn builder() -> ThreeLevelCacheBuilder<K, V> {
        ThreeLevelCacheBuilder {
            level1: None,
            level2: None,
            level3: None,
            loader: None,
        }
    }

    pub fn new(
        level1: SharedCache<K, V>,
        level2: SharedCache<K, V>,
        level3: SharedCache<K, V>,
        loader: Option<Loader<K, V>>,
    ) -> Self {
        Self {
            chain: TierChain::new(vec![level1, level2, level3], loader),
        }
    }

    pub fn level(&self, tier: Tier) -> Option<&SharedCache<K, V>> {
        self.chain.tier(tier)
    }

    /// Copy each key from the deepest tier holding it into every tier above.
    /// Returns the number of keys promoted.
    pub fn preload_to_upper_levels<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
    {
        self.chain.preload(keys)
    }

    /// Write the L1 value into L2 and L3, then drop it from L1
    pub fn demote_to_lower_levels(&self, key: &K) -> Result<bool> {
        self.chain.demote(key)
    }

    pub fn hit_count(&self, tier: Tier) -> u64 {
        self.chain.metrics().hits(tier)
    }

    pub fn hit_rate(&self, tier: Tier) -> f64 {
        self.chain.metrics().hit_rate(tier)
    }

    pub fn loader_call_count(&self) -> u64 {
        self.chain.metrics().loader_calls()
    }

    pub fn total_read_count(&self) -> u64 {
        self.chain.metrics().total_reads()
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

impl<K, V> Cache<K, V> for ThreeLevelCache<K, V>
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

    /// L3's size, not the union of the tiers
    fn size(&self) -> usize {
        self.chain.size()
    }
}

impl<K, V> fmt::Display for ThreeLevelCache<K, V>
where
    K: Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreeLevelCache Stats: {}", self.stats_snapshot())
    }
}

impl<K, V> fmt::Debug for ThreeLevelCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreeLevelCache")
            .field("chain", &self.chain)
            .finish()
    }
}
