//! Cache Registry
//!
//! Named collection of caches with aggregated statistics, a periodic
//! monitoring report and Prometheus text exposition.
//!
//! The registry is an ordinary value: construct it, pass it by reference to
//! whatever needs it and call [`CacheRegistry::shutdown`] when done. Caches of
//! different key/value types share one registry; typed access goes through
//! [`CacheRegistry::get`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{Cache, PeriodicTask, SharedCache};
use crate::decorator::StatsSnapshot;
use crate::error::{Error, Result};

/// Thread name of the monitoring task
const MONITOR_TASK_NAME: &str = "cache-registry-monitor";

/// Label carrying the cache name in exported metrics
const CACHE_LABEL: &str = "cache";

// =============================================================================
// Type-Erased Entries
// =============================================================================

/// Operations the registry needs regardless of key/value types
trait RegisteredCache: Send + Sync {
    fn size(&self) -> usize;
    fn stats(&self) -> Option<StatsSnapshot>;
    fn clear(&self) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

struct Registered<K, V> {
    cache: SharedCache<K, V>,
}

impl<K: 'static, V: 'static> RegisteredCache for Registered<K, V> {
    fn size(&self) -> usize {
        self.cache.size()
    }

    fn stats(&self) -> Option<StatsSnapshot> {
        self.cache.stats()
    }

    fn clear(&self) -> Result<()> {
        self.cache.clear()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Entries = Arc<RwLock<BTreeMap<String, Arc<dyn RegisteredCache>>>>;

// =============================================================================
// Reports
// =============================================================================

/// Statistics of one registered cache.
///
/// Caches that do not collect statistics report zero hits and misses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    fn collect(entry: &dyn RegisteredCache) -> Self {
        let size = entry.size();
        match entry.stats() {
            Some(stats) => Self {
                size,
                hits: stats.hits,
                misses: stats.misses,
                hit_rate: stats.hit_rate,
            },
            None => Self {
                size,
                ..Self::default()
            },
        }
    }
}

/// Summary over every registered cache
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub generated_at: DateTime<Utc>,
    pub caches: BTreeMap<String, CacheStats>,
    pub total_size: usize,
    pub total_accesses: u64,
    pub overall_hit_rate: f64,
}

impl RegistryReport {
    fn build(caches: BTreeMap<String, CacheStats>) -> Self {
        let total_size = caches.values().map(|s| s.size).sum();
        let total_hits: u64 = caches.values().map(|s| s.hits).sum();
        let total_misses: u64 = caches.values().map(|s| s.misses).sum();
        let total_accesses = total_hits + total_misses;
        let overall_hit_rate = if total_accesses == 0 {
            0.0
        } else {
            total_hits as f64 / total_accesses as f64
        };

        Self {
            generated_at: Utc::now(),
            caches,
            total_size,
            total_accesses,
            overall_hit_rate,
        }
    }
}

impl fmt::Display for RegistryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cache Registry Report ({}) ===", self.generated_at.to_rfc3339())?;
        writeln!(f, "Caches: {}", self.caches.len())?;
        for (name, stats) in &self.caches {
            writeln!(
                f,
                "[{}]: size={}, hits={}, misses={}, hitRate={:.1}%",
                name,
                stats.size,
                stats.hits,
                stats.misses,
                stats.hit_rate * 100.0
            )?;
        }
        write!(
            f,
            "Total: size={}, accesses={}, hitRate={:.1}%",
            self.total_size,
            self.total_accesses,
            self.overall_hit_rate * 100.0
        )
    }
}

fn collect_stats(entries: &Entries) -> BTreeMap<String, CacheStats> {
    entries
        .read()
        .iter()
        .map(|(name, entry)| (name.clone(), CacheStats::collect(entry.as_ref())))
        .collect()
}

// =============================================================================
// Registry
// =============================================================================

/// Named caches plus an optional monitoring task
pub struct CacheRegistry {
    entries: Entries,
    monitor: Mutex<Option<PeriodicTask>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            monitor: Mutex::new(None),
        }
    }

    /// Register `cache` under `name`, replacing any cache already there
    pub fn register<K, V>(&self, name: impl Into<String>, cache: SharedCache<K, V>) -> Result<()>
    where
        K: 'static,
        V: 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "cache name must not be blank".to_string(),
            ));
        }

        let previous = self
            .entries
            .write()
            .insert(name.clone(), Arc::new(Registered { cache }));
        if previous.is_some() {
            warn!(cache = %name, "Replaced registered cache");
        } else {
            info!(cache = %name, "Registered cache");
        }
        Ok(())
    }

    /// Typed lookup; `None` when the name is unknown or registered with
    /// different key/value types
    pub fn get<K, V>(&self, name: &str) -> Option<SharedCache<K, V>>
    where
        K: 'static,
        V: 'static,
    {
        let entries = self.entries.read();
        entries
            .get(name)?
            .as_any()
            .downcast_ref::<Registered<K, V>>()
            .map(|registered| Arc::clone(&registered.cache))
    }

    /// Unregister a cache; returns whether it was present
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.entries.write().remove(name).is_some();
        if removed {
            info!(cache = %name, "Removed cache");
        }
        removed
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clear every registered cache.
    ///
    /// All caches are attempted; the first failure is returned.
    pub fn clear_all(&self) -> Result<()> {
        let entries: Vec<_> = self.entries.read().values().cloned().collect();
        let mut first_error = None;
        for entry in entries {
            if let Err(err) = entry.clear() {
                warn!("Failed to clear cache: {}", err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Cleared all caches");
                Ok(())
            }
        }
    }

    /// Per-cache statistics keyed by name
    pub fn cache_stats(&self) -> BTreeMap<String, CacheStats> {
        collect_stats(&self.entries)
    }

    /// Summary with totals across caches
    pub fn report(&self) -> RegistryReport {
        RegistryReport::build(self.cache_stats())
    }

    /// Log [`report`](Self::report) every `interval`.
    ///
    /// Returns `false` without starting anything when monitoring is already
    /// running.
    pub fn start_monitoring(&self, interval: Duration) -> Result<bool> {
        let mut monitor = self.monitor.lock();
        if monitor.as_ref().is_some_and(PeriodicTask::is_running) {
            info!("Cache monitoring already running");
            return Ok(false);
        }

        let entries = Arc::clone(&self.entries);
        let task = PeriodicTask::spawn(MONITOR_TASK_NAME, interval, move || {
            let report = RegistryReport::build(collect_stats(&entries));
            info!("{}", report);
        })?;
        *monitor = Some(task);

        info!(?interval, "Cache monitoring started");
        Ok(true)
    }

    /// Stop monitoring; returns whether it was running
    pub fn stop_monitoring(&self) -> bool {
        let stopped = self
            .monitor
            .lock()
            .take()
            .is_some_and(|task| task.stop());
        if stopped {
            info!("Cache monitoring stopped");
        }
        stopped
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(PeriodicTask::is_running)
    }

    /// Render size, hits, misses and hit rate of every cache in the
    /// Prometheus text format
    pub fn render_prometheus(&self) -> Result<String> {
        let registry = Registry::new();
        let size = register_gauge(&registry, "tiercache_size", "Entries held by the cache")?;
        let hits = register_gauge(&registry, "tiercache_hits", "Reads answered by the cache")?;
        let misses = register_gauge(&registry, "tiercache_misses", "Reads not answered by the cache")?;
        let hit_rate = register_gauge(&registry, "tiercache_hit_rate", "Hits over total reads")?;

        for (name, stats) in self.cache_stats() {
            let labels = [name.as_str()];
            size.with_label_values(&labels).set(stats.size as f64);
            hits.with_label_values(&labels).set(stats.hits as f64);
            misses.with_label_values(&labels).set(stats.misses as f64);
            hit_rate.with_label_values(&labels).set(stats.hit_rate);
        }

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Metrics(e.to_string()))
    }

    /// Stop monitoring, clear every cache and drop them all
    pub fn shutdown(&self) -> Result<()> {
        self.stop_monitoring();
        let result = self.clear_all();
        self.entries.write().clear();
        info!("Cache registry shut down");
        result
    }
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[CACHE_LABEL])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("names", &self.names())
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
