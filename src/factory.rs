//! Cache Factory
//!
//! Builds caches from configuration strings of the form `type[:arg[:arg]]`:
//!
//! | String | Cache |
//! |--------|-------|
//! | `simple` | [`SimpleCache`] (not thread-safe) |
//! | `sync` | [`SynchronizedCache`] |
//! | `lock`, `lock:fair` | [`LockedCache`] |
//! | `rwlock` | [`RwLockCache`] |
//! | `concurrent`, `concurrent:N` | [`ConcurrentCache`] with initial capacity N |
//! | `optimized` | [`OptimizedConcurrentCache`] |
//! | `lru:N` | [`LruCache`] holding N entries |
//! | `lru-stats:N` | [`LruCache`] wrapped in [`StatsCache`] |
//! | `expiring:TTL_MS`, `expiring:TTL_MS:SWEEP_MS` | [`ExpiringCache`] |
//!
//! The type is case-insensitive.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{
    Cache, ExpiringCache, ExpiringConfig, Loader, LruCache, SharedCache, DEFAULT_SWEEP_INTERVAL,
};
use crate::composite::{SegmentedConfig, SegmentedTwoLevelCache, ThreeLevelCache, TwoLevelCache};
use crate::config::ToolkitConfig;
use crate::decorator::StatsCache;
use crate::error::{Error, Result};
use crate::store::{
    ConcurrentCache, LockedCache, OptimizedConcurrentCache, RwLockCache, SimpleCache,
    SynchronizedCache, DEFAULT_INITIAL_CAPACITY,
};

/// A parsed cache configuration string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Simple,
    Synchronized,
    Locked { fair: bool },
    RwLock,
    Concurrent { initial_capacity: Option<usize> },
    Optimized,
    Lru { capacity: usize },
    LruStats { capacity: usize },
    Expiring {
        ttl: Duration,
        sweep_interval: Option<Duration>,
    },
}

impl CacheKind {
    /// Whether the cache can be shared across threads
    pub fn is_thread_safe(&self) -> bool {
        !matches!(self, CacheKind::Simple)
    }
}

fn parse_number(kind: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| {
        Error::InvalidConfig(format!("{}: '{}' is not a valid number", kind, raw))
    })
}

fn parse_capacity(kind: &str, raw: Option<&str>) -> Result<usize> {
    let raw = raw.ok_or_else(|| {
        Error::InvalidConfig(format!("{} requires a capacity, e.g. {}:100", kind, kind))
    })?;
    let capacity = parse_number(kind, raw)?;
    usize::try_from(capacity)
        .map_err(|_| Error::InvalidConfig(format!("{}: capacity {} too large", kind, capacity)))
}

impl FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "cache configuration must not be empty".to_string(),
            ));
        }

        let mut parts = s.split(':');
        let kind = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let first = parts.next();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(Error::InvalidConfig(format!(
                "too many arguments in cache configuration '{}'",
                s
            )));
        }

        let takes_args = |max: usize| -> Result<()> {
            let given = usize::from(first.is_some()) + usize::from(second.is_some());
            if given > max {
                return Err(Error::InvalidConfig(format!(
                    "{} takes at most {} argument(s), got '{}'",
                    kind, max, s
                )));
            }
            Ok(())
        };

        let parsed = match kind.as_str() {
            "simple" => {
                takes_args(0)?;
                CacheKind::Simple
            }
            "sync" => {
                takes_args(0)?;
                CacheKind::Synchronized
            }
            "lock" => {
                takes_args(1)?;
                let fair = match first.map(|arg| arg.trim().to_ascii_lowercase()) {
                    None => false,
                    Some(arg) if arg == "fair" => true,
                    Some(arg) => {
                        return Err(Error::InvalidConfig(format!(
                            "lock: unknown option '{}'",
                            arg
                        )))
                    }
                };
                CacheKind::Locked { fair }
            }
            "rwlock" => {
                takes_args(0)?;
                CacheKind::RwLock
            }
            "concurrent" => {
                takes_args(1)?;
                let initial_capacity = first
                    .map(|raw| parse_capacity("concurrent", Some(raw)))
                    .transpose()?;
                CacheKind::Concurrent { initial_capacity }
            }
            "optimized" => {
                takes_args(0)?;
                CacheKind::Optimized
            }
            "lru" => {
                takes_args(1)?;
                CacheKind::Lru {
                    capacity: parse_capacity("lru", first)?,
                }
            }
            "lru-stats" => {
                takes_args(1)?;
                CacheKind::LruStats {
                    capacity: parse_capacity("lru-stats", first)?,
                }
            }
            "expiring" => {
                let ttl = first.ok_or_else(|| {
                    Error::InvalidConfig(
                        "expiring requires a ttl in milliseconds, e.g. expiring:60000".to_string(),
                    )
                })?;
                CacheKind::Expiring {
                    ttl: Duration::from_millis(parse_number("expiring", ttl)?),
                    sweep_interval: second
                        .map(|raw| parse_number("expiring", raw).map(Duration::from_millis))
                        .transpose()?,
                }
            }
            other => {
                return Err(Error::InvalidConfig(format!(
                    "unsupported cache type: {}",
                    other
                )))
            }
        };
        Ok(parsed)
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Simple => write!(f, "simple"),
            CacheKind::Synchronized => write!(f, "sync"),
            CacheKind::Locked { fair: false } => write!(f, "lock"),
            CacheKind::Locked { fair: true } => write!(f, "lock:fair"),
            CacheKind::RwLock => write!(f, "rwlock"),
            CacheKind::Concurrent {
                initial_capacity: None,
            } => write!(f, "concurrent"),
            CacheKind::Concurrent {
                initial_capacity: Some(capacity),
            } => write!(f, "concurrent:{}", capacity),
            CacheKind::Optimized => write!(f, "optimized"),
            CacheKind::Lru { capacity } => write!(f, "lru:{}", capacity),
            CacheKind::LruStats { capacity } => write!(f, "lru-stats:{}", capacity),
            CacheKind::Expiring {
                ttl,
                sweep_interval: None,
            } => write!(f, "expiring:{}", ttl.as_millis()),
            CacheKind::Expiring {
                ttl,
                sweep_interval: Some(sweep),
            } => write!(f, "expiring:{}:{}", ttl.as_millis(), sweep.as_millis()),
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

fn shared<K, V, C>(cache: C) -> SharedCache<K, V>
where
    C: Cache<K, V> + Send + Sync + 'static,
{
    Arc::new(cache)
}

/// Build any kind, including the single-threaded [`SimpleCache`]
pub fn build_local<K, V>(kind: CacheKind) -> Result<Box<dyn Cache<K, V>>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match kind {
        CacheKind::Simple => Ok(Box::new(SimpleCache::new())),
        other => Ok(Box::new(build_shared(other)?)),
    }
}

/// Build a thread-safe cache; `simple` is rejected
pub fn build_shared<K, V>(kind: CacheKind) -> Result<SharedCache<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let cache = match kind {
        CacheKind::Simple => {
            return Err(Error::InvalidConfig(
                "simple cache is not thread-safe and cannot be shared".to_string(),
            ))
        }
        CacheKind::Synchronized => shared(SynchronizedCache::new()),
        CacheKind::Locked { fair } => shared(LockedCache::with_capacity(DEFAULT_INITIAL_CAPACITY, fair)),
        CacheKind::RwLock => shared(RwLockCache::new()),
        CacheKind::Concurrent { initial_capacity } => shared(ConcurrentCache::with_capacity(
            initial_capacity.unwrap_or(DEFAULT_INITIAL_CAPACITY),
        )),
        CacheKind::Optimized => shared(OptimizedConcurrentCache::new()),
        CacheKind::Lru { capacity } => shared(LruCache::new(capacity)?),
        CacheKind::LruStats { capacity } => shared(StatsCache::new(LruCache::new(capacity)?)),
        CacheKind::Expiring {
            ttl,
            sweep_interval,
        } => shared(ExpiringCache::with_config(ExpiringConfig {
            default_ttl: ttl,
            sweep_interval: sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
        })?),
    };
    debug!(kind = %kind, "Built cache");
    Ok(cache)
}

/// Parse a configuration string and build the cache it names
pub fn from_config_str<K, V>(config: &str) -> Result<Box<dyn Cache<K, V>>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    build_local(config.parse()?)
}

/// Two-level cache with a statistics-collecting LRU in front of a concurrent
/// map
pub fn recommended<K, V>(l1_capacity: usize, l2_initial_capacity: usize) -> Result<TwoLevelCache<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let l1 = build_shared(CacheKind::LruStats {
        capacity: l1_capacity,
    })?;
    let l2 = build_shared(CacheKind::Concurrent {
        initial_capacity: Some(l2_initial_capacity),
    })?;
    Ok(TwoLevelCache::new(l1, l2))
}

/// Build the tier chain described by `config`.
///
/// One tier is returned as is (a loader needs at least two). Two tiers give a
/// [`TwoLevelCache`], or a [`SegmentedTwoLevelCache`] when `segmented` is set.
/// Three tiers give a [`ThreeLevelCache`].
pub fn build_tiered<K, V>(config: &ToolkitConfig, loader: Option<Loader<K, V>>) -> Result<SharedCache<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    config.validate()?;
    let mut tiers = config
        .tier_kinds()?
        .into_iter()
        .map(build_shared::<K, V>)
        .collect::<Result<Vec<SharedCache<K, V>>>>()?
        .into_iter();

    let cache = match (tiers.next(), tiers.next(), tiers.next()) {
        (Some(l1), None, None) => {
            if loader.is_some() {
                return Err(Error::InvalidConfig(
                    "a loader requires at least 2 tiers".to_string(),
                ));
            }
            l1
        }
        (Some(l1), Some(l2), None) if config.segmented => {
            let segmented = SegmentedConfig {
                segment_count: config.segment_count,
            };
            shared(SegmentedTwoLevelCache::with_config(l1, l2, loader, segmented)?)
        }
        (Some(l1), Some(l2), None) => match loader {
            Some(loader) => shared(TwoLevelCache::with_loader(l1, l2, loader)),
            None => shared(TwoLevelCache::new(l1, l2)),
        },
        (Some(l1), Some(l2), Some(l3)) => shared(ThreeLevelCache::new(l1, l2, l3, loader)),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "unsupported tier count: {}",
                config.tiers.len()
            )))
        }
    };

    debug!(tiers = ?config.tiers, segmented = config.segmented, "Built tier chain");
    Ok(cache)
}

// =============================================================================
// Tests
// =============================================================================
