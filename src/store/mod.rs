//! Single-Tier Stores
//!
//! Unbounded key/value stores that differ only in their concurrency
//! discipline. Each is usable on its own or as a tier of a composite cache.
//!
//! | Store | Discipline | Shareable |
//! |-------|------------|-----------|
//! | [`SimpleCache`] | none (`RefCell`) | no (`!Sync`) |
//! | [`SynchronizedCache`] | one mutex | yes |
//! | [`LockedCache`] | mutex, optional fair hand-off, timed and interruptible | yes |
//! | [`RwLockCache`] | reader/writer lock | yes |
//! | [`ConcurrentCache`] | sharded map | yes |
//! | [`OptimizedConcurrentCache`] | sharded map, striped counters, single-flight load | yes |

mod concurrent;
mod locked;
mod optimized;
mod rwlock;
mod simple;
mod synchronized;

pub use concurrent::ConcurrentCache;
pub use locked::LockedCache;
pub use optimized::OptimizedConcurrentCache;
pub use rwlock::RwLockCache;
pub use simple::SimpleCache;
pub use synchronized::SynchronizedCache;

/// Initial map capacity when none is given
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use std::sync::Arc;
    use std::thread;

    /// Shared contract every thread-safe store must satisfy
    fn exercise_contract<C>(cache: C)
    where
        C: Cache<String, u64> + Send + Sync + 'static,
    {
        let cache = Arc::new(cache);
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..250u64 {
                        let key = format!("t{}-{}", t, i);
                        cache.put(key.clone(), i).unwrap();
                        assert_eq!(cache.get(&key).unwrap(), Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 1000);
        cache.remove(&"t0-0".to_string()).unwrap();
        assert_eq!(cache.get(&"t0-0".to_string()).unwrap(), None);
        assert_eq!(cache.size(), 999);
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_thread_safe_stores_share_contract() {
        exercise_contract(SynchronizedCache::new());
        exercise_contract(LockedCache::new());
        exercise_contract(LockedCache::fair());
        exercise_contract(RwLockCache::new());
        exercise_contract(ConcurrentCache::new());
        exercise_contract(OptimizedConcurrentCache::new());
    }
}
