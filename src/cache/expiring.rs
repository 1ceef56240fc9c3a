//! Expiring Cache
//!
//! Per-entry TTL over a sharded concurrent map. Expired entries are dropped
//! lazily on read and actively by a background sweep.
//!
//! # Design
//!
//! - Deadlines are absolute epoch milliseconds taken from a [`Clock`]
//! - A re-put replaces both value and deadline
//! - The sweep is an owned [`PeriodicTask`]; dropping the cache stops it

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{Cache, Clock, ExpiringEntry, PeriodicTask, SystemClock, DEFAULT_SWEEP_INTERVAL};
use crate::error::{Error, Result};

/// Expiring cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiringConfig {
    /// TTL applied by `put`
    pub default_ttl: Duration,
    /// Interval between background sweeps
    pub sweep_interval: Duration,
}

impl Default for ExpiringConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Cache whose entries disappear after a time-to-live
pub struct ExpiringCache<K, V> {
    entries: Arc<DashMap<K, ExpiringEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    sweeper: PeriodicTask,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with `default_ttl` and the default sweep interval
    pub fn new(default_ttl: Duration) -> Result<Self> {
        Self::with_config(ExpiringConfig {
            default_ttl,
            ..ExpiringConfig::default()
        })
    }

    /// Create a cache from a configuration, reading wall-clock time
    pub fn with_config(config: ExpiringConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(config: ExpiringConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.default_ttl.is_zero() {
            return Err(Error::InvalidConfig(
                "default ttl must be greater than 0".to_string(),
            ));
        }

        let entries = Arc::new(DashMap::new());
        let sweeper = {
            let entries = Arc::clone(&entries);
            let clock = Arc::clone(&clock);
            PeriodicTask::spawn("expiring-cache-sweep", config.sweep_interval, move || {
                let removed = purge(&entries, clock.now_millis());
                if removed > 0 {
                    debug!(removed, remaining = entries.len(), "Expired entries swept");
                }
            })?
        };

        info!(
            default_ttl = ?config.default_ttl,
            sweep_interval = ?config.sweep_interval,
            "Expiring cache created"
        );

        Ok(Self {
            entries,
            default_ttl: config.default_ttl,
            clock,
            sweeper,
        })
    }

    /// Insert with an explicit TTL, replacing any previous value and deadline
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::InvalidArgument(
                "ttl must be greater than 0".to_string(),
            ));
        }

        let entry = ExpiringEntry::new(value, self.clock.now_millis(), ttl);
        self.entries.insert(key, entry);
        Ok(())
    }

    /// TTL applied by `put`
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Remaining lifetime of a live entry
    pub fn time_to_live(&self, key: &K) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.entries
            .get(key)
            .and_then(|entry| entry.value().remaining(now))
    }

    /// Number of entries that have not expired. Removes nothing.
    pub fn valid_size(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired_at(now))
            .count()
    }

    /// Run one sweep cycle now, returning how many entries were removed
    pub fn purge_expired(&self) -> usize {
        let removed = purge(&self.entries, self.clock.now_millis());
        debug!(removed, "Expired entries purged");
        removed
    }

    /// Check if the background sweep is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the background sweep.
    ///
    /// Returns `true` only on the call that stopped it. Lazy expiration on
    /// read keeps working afterwards.
    pub fn shutdown(&self) -> bool {
        let stopped = self.sweeper.stop();
        if stopped {
            info!(entries = self.entries.len(), "Expiring cache sweep stopped");
        }
        stopped
    }
}

/// Remove every entry expired at `now`
fn purge<K, V>(entries: &DashMap<K, ExpiringEntry<V>>, now: u64) -> usize
where
    K: Hash + Eq,
{
    let mut removed = 0;
    entries.retain(|_, entry| {
        let live = !entry.is_expired_at(now);
        if !live {
            removed += 1;
        }
        live
    });
    removed
}

impl<K, V> Cache<K, V> for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        self.put_with_ttl(key, value, self.default_ttl)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        let now = self.clock.now_millis();
        {
            let Some(entry) = self.entries.get(key) else {
                return Ok(None);
            };
            if !entry.value().is_expired_at(now) {
                return Ok(Some(entry.value().value().clone()));
            }
        }

        // Shard guard released above; only drop the entry if it is still the expired one
        self.entries
            .remove_if(key, |_, entry| entry.is_expired_at(now));
        Ok(None)
    }

    fn remove(&self, key: &K) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    /// Physical entry count, including expired entries not yet swept
    fn size(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> std::fmt::Debug for ExpiringCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
