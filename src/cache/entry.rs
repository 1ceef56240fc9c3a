//! Cache Entry Types
//!
//! Entries of the expiring cache carry their absolute deadline. Plain stores
//! hold bare values and the LRU cache keeps recency as list position, so they
//! need no metadata.

use std::time::Duration;

/// A value paired with its expiration deadline (epoch milliseconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringEntry<V> {
    value: V,
    expire_at_millis: u64,
}

impl<V> ExpiringEntry<V> {
    /// Create an entry written at `now_millis` that lives for `ttl`
    pub fn new(value: V, now_millis: u64, ttl: Duration) -> Self {
        Self {
            value,
            expire_at_millis: now_millis.saturating_add(ttl.as_millis() as u64),
        }
    }

    /// Get the stored value
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consume the entry, returning the value
    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Deadline (epoch milliseconds)
    #[inline]
    pub fn expire_at_millis(&self) -> u64 {
        self.expire_at_millis
    }

    /// An entry is expired strictly after its deadline
    #[inline]
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis > self.expire_at_millis
    }

    /// Time left before the deadline, `None` once expired
    pub fn remaining(&self, now_millis: u64) -> Option<Duration> {
        if self.is_expired_at(now_millis) {
            None
        } else {
            Some(Duration::from_millis(self.expire_at_millis - now_millis))
        }
    }
}
