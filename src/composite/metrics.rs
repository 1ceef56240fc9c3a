//! Tier Metrics Collection
//!
//! Per-tier hit counts, loader invocations and total reads for composite
//! caches. Every counter is an independent atomic, so a snapshot taken during
//! concurrent reads may be momentarily inconsistent across counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::Tier;

/// Composite cache metrics collector
#[derive(Debug)]
pub struct TierMetrics {
    tier_hits: Box<[AtomicU64]>,
    loader_calls: AtomicU64,
    total_reads: AtomicU64,
}

impl TierMetrics {
    /// Create a collector for a chain of `levels` tiers
    pub fn new(levels: usize) -> Self {
        Self {
            tier_hits: (0..levels).map(|_| AtomicU64::new(0)).collect(),
            loader_calls: AtomicU64::new(0),
            total_reads: AtomicU64::new(0),
        }
    }

    /// Number of tiers tracked
    pub fn levels(&self) -> usize {
        self.tier_hits.len()
    }

    pub fn record_read(&self) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self, tier: Tier) {
        if let Some(counter) = self.tier_hits.get(tier.index()) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_load(&self) {
        self.loader_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Hits served by `tier` (0 for tiers the chain does not have)
    pub fn hits(&self, tier: Tier) -> u64 {
        self.tier_hits
            .get(tier.index())
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    pub fn loader_calls(&self) -> u64 {
        self.loader_calls.load(Ordering::Relaxed)
    }

    pub fn total_reads(&self) -> u64 {
        self.total_reads.load(Ordering::Relaxed)
    }

    /// Tier hits over total reads
    pub fn hit_rate(&self, tier: Tier) -> f64 {
        ratio(self.hits(tier), self.total_reads())
    }

    /// Sum of tier hits over total reads
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self
            .tier_hits
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum();
        ratio(hits, self.total_reads())
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> TierStatsSnapshot {
        let tier_hits: Vec<u64> = self
            .tier_hits
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect();
        let total_reads = self.total_reads();
        let overall_hit_rate = ratio(tier_hits.iter().sum(), total_reads);

        TierStatsSnapshot {
            total_reads,
            tier_hits,
            loader_calls: self.loader_calls(),
            overall_hit_rate,
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in self.tier_hits.iter() {
            counter.store(0, Ordering::Relaxed);
        }
        self.loader_calls.store(0, Ordering::Relaxed);
        self.total_reads.store(0, Ordering::Relaxed);
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Snapshot of composite cache metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatsSnapshot {
    pub total_reads: u64,
    /// Hits per tier, L1 first
    pub tier_hits: Vec<u64>,
    pub loader_calls: u64,
    pub overall_hit_rate: f64,
}

impl TierStatsSnapshot {
    /// Hits served by `tier`
    pub fn hits(&self, tier: Tier) -> u64 {
        self.tier_hits.get(tier.index()).copied().unwrap_or(0)
    }

    /// Tier hits over total reads
    pub fn hit_rate(&self, tier: Tier) -> f64 {
        ratio(self.hits(tier), self.total_reads)
    }
}

impl fmt::Display for TierStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "totalReads={}", self.total_reads)?;
        for (tier, hits) in Tier::ALL.iter().zip(self.tier_hits.iter()) {
            write!(
                f,
                ", {}Hits={} ({:.1}%)",
                tier,
                hits,
                self.hit_rate(*tier) * 100.0
            )?;
        }
        write!(
            f,
            ", overallHitRate={:.1}%, loaderCalls={}",
            self.overall_hit_rate * 100.0,
            self.loader_calls
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TierMetrics::new(2);
        assert_eq!(metrics.levels(), 2);
        assert_eq!(metrics.hits(Tier::L1), 0);
        assert_eq!(metrics.overall_hit_rate(), 0.0);
        assert_eq!(metrics.hit_rate(Tier::L2), 0.0);
    }

    #[test]
    fn test_hit_tracking() {
        let metrics = TierMetrics::new(2);
        for _ in 0..4 {
            metrics.record_read();
        }
        metrics.record_hit(Tier::L1);
        metrics.record_hit(Tier::L1);
        metrics.record_hit(Tier::L2);
        metrics.record_load();
        // A tier the chain lacks is ignored
        metrics.record_hit(Tier::L3);

        assert_eq!(metrics.hits(Tier::L1), 2);
        assert_eq!(metrics.hits(Tier::L3), 0);
        assert!((metrics.hit_rate(Tier::L1) - 0.5).abs() < 1e-9);
        assert!((metrics.overall_hit_rate() - 0.75).abs() < 1e-9);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tier_hits, vec![2, 1]);
        assert_eq!(snapshot.loader_calls, 1);
        assert_eq!(
            snapshot.to_string(),
            "totalReads=4, L1Hits=2 (50.0%), L2Hits=1 (25.0%), overallHitRate=75.0%, loaderCalls=1"
        );
    }

    #[test]
    fn test_reset() {
        let metrics = TierMetrics::new(3);
        metrics.record_read();
        metrics.record_hit(Tier::L3);
        metrics.record_load();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_reads, 0);
        assert_eq!(snapshot.tier_hits, vec![0, 0, 0]);
        assert_eq!(snapshot.loader_calls, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = TierMetrics::new(1);
        metrics.record_read();
        metrics.record_hit(Tier::L1);

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["total_reads"], 1);
        assert_eq!(json["tier_hits"][0], 1);
        assert_eq!(json["overall_hit_rate"], 1.0);
    }
}
