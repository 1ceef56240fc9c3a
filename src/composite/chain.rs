//! Tier Chain
//!
//! The shared engine behind every composite cache: an ordered list of tiers
//! (L1 first), an optional loader and the tier metrics.

use tracing::trace;

use super::{Tier, TierMetrics};
use crate::cache::{Cache, Loader, SharedCache};
use crate::error::Result;

/// Ordered tiers plus loader
pub struct TierChain<K, V> {
    tiers: Vec<SharedCache<K, V>>,
    loader: Option<Loader<K, V>>,
    metrics: TierMetrics,
}

impl<K, V> TierChain<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Build a chain from tiers ordered shallowest first
    pub fn new(tiers: Vec<SharedCache<K, V>>, loader: Option<Loader<K, V>>) -> Self {
        let metrics = TierMetrics::new(tiers.len());
        Self {
            tiers,
            loader,
            metrics,
        }
    }

    /// Number of tiers
    pub fn levels(&self) -> usize {
        self.tiers.len()
    }

    /// Tier at `tier`, if the chain is that deep
    pub fn tier(&self, tier: Tier) -> Option<&SharedCache<K, V>> {
        self.tiers.get(tier.index())
    }

    pub fn metrics(&self) -> &TierMetrics {
        &self.metrics
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Counted read through every tier, then the loader
    pub fn lookup(&self, key: &K) -> Result<Option<V>> {
        self.metrics.record_read();
        self.resolve(key)
    }

    /// Probe every tier from L1 down, then the loader, without counting the
    /// read itself. Tier hits and loader calls are counted.
    pub fn resolve(&self, key: &K) -> Result<Option<V>> {
        for (depth, tier) in self.tiers.iter().enumerate() {
            if let Some(value) = tier.get(key)? {
                if let Some(hit) = Tier::from_index(depth) {
                    self.metrics.record_hit(hit);
                }
                self.backfill(depth, key, &value)?;
                return Ok(Some(value));
            }
        }

        let Some(loader) = &self.loader else {
            return Ok(None);
        };

        self.metrics.record_load();
        match loader(key)? {
            Some(value) => {
                self.write_through(key.clone(), value.clone())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Copy a value found at `depth` into every shallower tier, deepest first
    fn backfill(&self, depth: usize, key: &K, value: &V) -> Result<()> {
        for tier in self.tiers[..depth].iter().rev() {
            tier.put(key.clone(), value.clone())?;
        }
        if depth > 0 {
            trace!(depth, "backfilled upper tiers");
        }
        Ok(())
    }

    /// Write into every tier, deepest first
    pub fn write_through(&self, key: K, value: V) -> Result<()> {
        for tier in self.tiers.iter().rev() {
            tier.put(key.clone(), value.clone())?;
        }
        Ok(())
    }

    /// Remove from every tier, shallowest first
    pub fn remove_all(&self, key: &K) -> Result<()> {
        for tier in &self.tiers {
            tier.remove(key)?;
        }
        Ok(())
    }

    /// Clear every tier, shallowest first
    pub fn clear_all(&self) -> Result<()> {
        for tier in &self.tiers {
            tier.clear()?;
        }
        Ok(())
    }

    /// Deepest tier's size
    pub fn size(&self) -> usize {
        self.tiers.last().map_or(0, |tier| tier.size())
    }

    /// Copy each key from the deepest tier holding it up into every tier
    /// above. Absent keys are skipped; metrics are untouched.
    ///
    /// Returns the number of keys promoted.
    pub fn preload<I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
    {
        let mut promoted = 0;
        for key in keys {
            for depth in (0..self.tiers.len()).rev() {
                if let Some(value) = self.tiers[depth].get(&key)? {
                    self.backfill(depth, &key, &value)?;
                    promoted += 1;
                    break;
                }
            }
        }
        Ok(promoted)
    }

    /// Write the L1 value into every lower tier, then drop it from L1.
    ///
    /// Returns `false` when L1 does not hold the key.
    pub fn demote(&self, key: &K) -> Result<bool> {
        let Some((top, lower)) = self.tiers.split_first() else {
            return Ok(false);
        };
        let Some(value) = top.get(key)? else {
            return Ok(false);
        };

        for tier in lower.iter().rev() {
            tier.put(key.clone(), value.clone())?;
        }
        top.remove(key)?;
        Ok(true)
    }
}

impl<K, V> std::fmt::Debug for TierChain<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierChain")
            .field("levels", &self.tiers.len())
            .field("has_loader", &self.loader.is_some())
            .field("metrics", &self.metrics)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
