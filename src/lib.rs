//! tiercache - In-Process Tiered Key/Value Cache Toolkit
//!
//! Building blocks for caching in front of slow data sources: bounded LRU and
//! time-expiring tiers, unbounded stores with different locking disciplines,
//! multi-level composites with read-through loading and write-through
//! propagation, and decorators for statistics and logging.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │           Decorators: StatsCache / LoggingCache                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Composites: TwoLevel / ThreeLevel / SegmentedTwoLevel           │
//! │       L1 ──miss──▶ L2 ──miss──▶ L3 ──miss──▶ loader              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Tiers: LruCache │ ExpiringCache │ store::* (unbounded maps)     │
//! └─────────────────────────────────────────────────────────────────┘
//!          ▲ all implement cache::Cache<K, V>
//! ```
//!
//! # Modules
//!
//! - [`cache`] - The `Cache` capability, LRU and expiring tiers, shared primitives
//! - [`store`] - Unbounded single-tier stores
//! - [`composite`] - Multi-level caches with per-tier statistics
//! - [`decorator`] - Statistics and logging wrappers
//! - [`registry`] - Named caches, monitoring and Prometheus exposition
//! - [`factory`] - Caches from configuration strings
//! - [`config`] - YAML toolkit configuration
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tiercache::{cache::loader, Cache, ConcurrentCache, LruCache, TwoLevelCache};
//!
//! let cache = TwoLevelCache::with_loader(
//!     Arc::new(LruCache::<u64, String>::new(100)?),
//!     Arc::new(ConcurrentCache::<u64, String>::new()),
//!     loader(|id: &u64| Ok(Some(format!("user-{}", id)))),
//! );
//!
//! assert_eq!(cache.get(&7)?, Some("user-7".to_string()));
//! assert_eq!(cache.loader_call_count(), 1);
//! # Ok::<(), tiercache::Error>(())
//! ```

pub mod cache;
pub mod composite;
pub mod config;
pub mod decorator;
pub mod error;
pub mod factory;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use cache::{Cache, ExpiringCache, Loader, LruCache, SharedCache};
pub use composite::{SegmentedTwoLevelCache, ThreeLevelCache, Tier, TwoLevelCache};
pub use config::ToolkitConfig;
pub use decorator::{LogLevel, LoggingCache, StatsCache};
pub use error::{Error, Result};
pub use factory::CacheKind;
pub use registry::CacheRegistry;
pub use store::{ConcurrentCache, OptimizedConcurrentCache};
