//! Composite Tiered Caches
//!
//! Chains of [`Cache`](crate::cache::Cache) tiers with read-through lookup,
//! backfill and write-through.
//!
//! # Read Path
//!
//! ```text
//! get(k) ─▶ L1 ──hit──────────────────────────────────▶ value
//!            │miss
//!            ▼
//!           L2 ──hit──▶ backfill L1 ─────────────────▶ value
//!            │miss
//!            ▼
//!           L3 ──hit──▶ backfill L2, L1 ─────────────▶ value
//!            │miss
//!            ▼
//!         loader ─Some─▶ write every tier (deepest first) ▶ value
//!                 └None─▶ absent
//! ```
//!
//! Writes go to the deepest tier first, so a failing tier never leaves a
//! shallower tier holding a value a deeper one lacks.

mod chain;
mod metrics;
mod segmented;
mod three_level;
mod two_level;

pub use chain::TierChain;
pub use metrics::{TierMetrics, TierStatsSnapshot};
pub use segmented::{SegmentedConfig, SegmentedTwoLevelCache, SegmentedTwoLevelCacheBuilder};
pub use three_level::{ThreeLevelCache, ThreeLevelCacheBuilder};
pub use two_level::{TwoLevelCache, TwoLevelCacheBuilder};

use crate::error::{Error, Result};

/// Cache tier position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// L1 - smallest, fastest
    L1,
    /// L2 - larger
    L2,
    /// L3 - largest
    L3,
}

impl Tier {
    /// Every tier, shallowest first
    pub const ALL: [Tier; 3] = [Tier::L1, Tier::L2, Tier::L3];

    /// Zero-based depth
    pub fn index(self) -> usize {
        match self {
            Tier::L1 => 0,
            Tier::L2 => 1,
            Tier::L3 => 2,
        }
    }

    /// Tier at a zero-based depth
    pub fn from_index(index: usize) -> Option<Tier> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::L1 => write!(f, "L1"),
            Tier::L2 => write!(f, "L2"),
            Tier::L3 => write!(f, "L3"),
        }
    }
}

/// Unwrap a builder slot or fail naming the missing tier
pub(crate) fn require<T>(slot: Option<T>, tier: Tier) -> Result<T> {
    slot.ok_or_else(|| Error::InvalidConfig(format!("{} cache must be provided", tier)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_index_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_index(tier.index()), Some(tier));
        }
        assert_eq!(Tier::from_index(3), None);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(Tier::L1.to_string(), "L1");
        assert_eq!(Tier::L3.to_string(), "L3");
    }

    #[test]
    fn test_require_names_missing_tier() {
        let err = require::<u8>(None, Tier::L2).unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: L2 cache must be provided");
    }
}
