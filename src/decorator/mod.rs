//! Instrumentation Decorators
//!
//! Wrappers that add measurement or logging to any [`Cache`](crate::cache::Cache)
//! without changing its behavior. Decorators compose; the wrap order decides
//! what is measured and what is logged:
//!
//! ```text
//! LoggingCache<StatsCache<LruCache>>   logs include the time spent counting
//! StatsCache<LoggingCache<LruCache>>   latencies include the time spent logging
//! ```

mod logging;
mod stats;

use std::time::{Duration, Instant};

pub use logging::{LogLevel, LogSink, LoggingCache, TracingSink, DEFAULT_CACHE_NAME};
pub use stats::{StatsCache, StatsSnapshot};

/// Latency tracker helper
#[derive(Debug, Clone, Copy)]
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed nanoseconds, saturating at `u64::MAX`
    pub fn elapsed_nanos(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
