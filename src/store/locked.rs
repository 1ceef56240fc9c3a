//! Explicit-Mutex Store
//!
//! A map behind one explicit mutex that adds what a plain monitor cannot:
//! fair hand-off, bounded waits and cancellable waits.
//!
//! # Design
//!
//! - Fair mode releases with `unlock_fair`, handing the lock to the longest
//!   waiter instead of letting the releasing thread barge back in
//! - Timed operations fail with `Error::LockTimeout` and leave the map untouched
//! - Interruptible operations poll a `CancellationToken` between short waits

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::DEFAULT_INITIAL_CAPACITY;
use crate::cache::Cache;
use crate::error::{Error, Result};

/// Wait slice between cancellation checks
const INTERRUPT_POLL: Duration = Duration::from_millis(10);

/// Map store behind an explicit, optionally fair, mutex
#[derive(Debug)]
pub struct LockedCache<K, V> {
    map: Mutex<HashMap<K, V>>,
    fair: bool,
}

impl<K, V> LockedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an unfair (barging) store
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY, false)
    }

    /// Create a store that hands the lock to waiters in arrival order
    pub fn fair() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY, true)
    }

    pub fn with_capacity(capacity: usize, fair: bool) -> Self {
        Self {
            map: Mutex::new(HashMap::with_capacity(capacity)),
            fair,
        }
    }

    /// Check if fair hand-off is enabled
    pub fn is_fair(&self) -> bool {
        self.fair
    }

    /// Insert, giving up after `timeout`
    pub fn try_put(&self, key: K, value: V, timeout: Duration) -> Result<()> {
        let mut map = self.acquire_for(timeout)?;
        map.insert(key, value);
        self.release(map);
        Ok(())
    }

    /// Look up, giving up after `timeout`
    pub fn try_get(&self, key: &K, timeout: Duration) -> Result<Option<V>> {
        let map = self.acquire_for(timeout)?;
        let value = map.get(key).cloned();
        self.release(map);
        Ok(value)
    }

    /// Look up, aborting with `Error::Interrupted` once `cancel` fires
    pub fn get_interruptibly(&self, key: &K, cancel: &CancellationToken) -> Result<Option<V>> {
        let map = self.acquire_interruptibly(cancel)?;
        let value = map.get(key).cloned();
        self.release(map);
        Ok(value)
    }

    /// Insert, aborting with `Error::Interrupted` once `cancel` fires
    pub fn put_interruptibly(&self, key: K, value: V, cancel: &CancellationToken) -> Result<()> {
        let mut map = self.acquire_interruptibly(cancel)?;
        map.insert(key, value);
        self.release(map);
        Ok(())
    }

    fn acquire(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.map.lock()
    }

    fn acquire_for(&self, timeout: Duration) -> Result<MutexGuard<'_, HashMap<K, V>>> {
        self.map
            .try_lock_for(timeout)
            .ok_or(Error::LockTimeout { waited: timeout })
    }

    fn acquire_interruptibly(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, HashMap<K, V>>> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            if let Some(guard) = self.map.try_lock_for(INTERRUPT_POLL) {
                return Ok(guard);
            }
        }
    }

    fn release(&self, guard: MutexGuard<'_, HashMap<K, V>>) {
        if self.fair {
            MutexGuard::unlock_fair(guard);
        } else {
            drop(guard);
        }
    }
}

impl<K, V> Default for LockedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V> for LockedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn put(&self, key: K, value: V) -> Result<()> {
        let mut map = self.acquire();
        map.insert(key, value);
        self.release(map);
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        let map = self.acquire();
        let value = map.get(key).cloned();
        self.release(map);
        Ok(value)
    }

    fn remove(&self, key: &K) -> Result<()> {
        let mut map = self.acquire();
        map.remove(key);
        self.release(map);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.acquire();
        map.clear();
        self.release(map);
        Ok(())
    }

    fn size(&self) -> usize {
        let map = self.acquire();
        let len = map.len();
        self.release(map);
        len
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fairness_flag() {
        assert!(!LockedCache::<u32, u32>::new().is_fair());
        assert!(LockedCache::<u32, u32>::fair().is_fair());
    }

    #[test]
    fn test_timed_operations_when_free() {
        let cache = LockedCache::new();
        cache.try_put("k", 1u32, Duration::from_millis(50)).unwrap();
        assert_eq!(cache.try_get(&"k", Duration::from_millis(50)).unwrap(), Some(1));
    }

    #[test]
    fn test_timed_put_times_out_while_held() {
        let cache = Arc::new(LockedCache::<&str, u32>::new());
        let held = cache.map.lock();

        let result = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.try_put("k", 1, Duration::from_millis(20)))
                .join()
                .unwrap()
        };
        drop(held);

        assert_matches!(result, Err(Error::LockTimeout { waited }) if waited == Duration::from_millis(20));
        // The failed put left nothing behind
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_interruptible_get_cancelled_while_waiting() {
        let cache = Arc::new(LockedCache::<&str, u32>::new());
        cache.put("k", 1).unwrap();
        let held = cache.map.lock();

        let token = CancellationToken::new();
        let (started_tx, started_rx) = mpsc::channel();
        let waiter = {
            let cache = Arc::clone(&cache);
            let token = token.clone();
            thread::spawn(move || {
                started_tx.send(()).unwrap();
                cache.get_interruptibly(&"k", &token)
            })
        };

        started_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(30));
        token.cancel();

        assert_matches!(waiter.join().unwrap(), Err(Error::Interrupted));
        drop(held);
    }

    #[test]
    fn test_interruptible_operations_succeed_uncancelled() {
        let cache = LockedCache::fair();
        let token = CancellationToken::new();
        cache.put_interruptibly("k", 5u32, &token).unwrap();
        assert_eq!(cache.get_interruptibly(&"k", &token).unwrap(), Some(5));
    }

    #[test]
    fn test_already_cancelled_token_aborts_immediately() {
        let cache = LockedCache::<&str, u32>::new();
        let token = CancellationToken::new();
        token.cancel();
        assert_matches!(cache.put_interruptibly("k", 1, &token), Err(Error::Interrupted));
        assert_eq!(cache.size(), 0);
    }
}
