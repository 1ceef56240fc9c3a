//! Logging Decorator
//!
//! Emits one line per operation on the wrapped cache:
//!
//! ```text
//! [users] INFO: GET hit: key="alice", value="{...}", time=812ns
//! [users] WARN: CLEAR: cleared 42 entries, time=3100ns
//! ```
//!
//! `get`, `put` and `remove` log at `Info`, `clear` at `Warn`, `size` at
//! `Debug`. Failures are logged at `Error` and returned unchanged. Lines go to
//! a [`LogSink`], by default [`TracingSink`].

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::LatencyTracker;
use crate::cache::Cache;
use crate::decorator::StatsSnapshot;
use crate::error::{Error, Result};

/// Name used when none is given
pub const DEFAULT_CACHE_NAME: &str = "Cache";

/// Values longer than this are abbreviated
const MAX_VALUE_CHARS: usize = 50;

/// Characters kept from an abbreviated value (before `...`)
const ABBREVIATED_CHARS: usize = 47;

// =============================================================================
// Log Levels
// =============================================================================

/// Severity of a log line, ordered `Debug < Info < Warn < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::InvalidConfig(format!("unknown log level: {}", other))),
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination of formatted log lines
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn log(&self, level: LogLevel, line: &str) {
        self(level, line)
    }
}

/// Forwards lines to `tracing` at the matching level
#[derive(Debug, Clone)]
pub struct TracingSink {
    cache: String,
}

impl TracingSink {
    pub fn new(cache: impl Into<String>) -> Self {
        Self {
            cache: cache.into(),
        }
    }
}

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, line: &str) {
        let cache = self.cache.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(cache, "{}", line),
            LogLevel::Info => tracing::info!(cache, "{}", line),
            LogLevel::Warn => tracing::warn!(cache, "{}", line),
            LogLevel::Error => tracing::error!(cache, "{}", line),
        }
    }
}

// =============================================================================
// Decorator
// =============================================================================

/// Cache wrapper logging every operation
pub struct LoggingCache<C> {
    inner: C,
    name: String,
    enabled: AtomicBool,
    min_level: AtomicU8,
    sink: RwLock<Arc<dyn LogSink>>,
}

impl<C> LoggingCache<C> {
    /// Wrap `inner` under the default name
    pub fn new(inner: C) -> Self {
        Self::with_name(inner, DEFAULT_CACHE_NAME)
    }

    pub fn with_name(inner: C, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inner,
            sink: RwLock::new(Arc::new(TracingSink::new(name.clone()))),
            name,
            enabled: AtomicBool::new(true),
            min_level: AtomicU8::new(LogLevel::Info.as_u8()),
        }
    }

    /// Get the wrapped cache
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Minimum severity that is emitted
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.min_level.store(level.as_u8(), Ordering::Relaxed);
    }

    /// Replace the sink
    pub fn set_sink(&self, sink: Arc<dyn LogSink>) {
        *self.sink.write() = sink;
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.is_enabled() && level >= self.log_level()
    }

    /// Build and emit a line only when `level` passes the filter
    fn log(&self, level: LogLevel, message: impl FnOnce() -> String) {
        if !self.should_log(level) {
            return;
        }
        let line = format!("[{}] {}: {}", self.name, level, message());
        let sink = self.sink.read().clone();
        sink.log(level, &line);
    }
}

/// Debug rendering of a value, cut to 47 characters plus `...` when it
/// exceeds 50
fn abbreviate(value: &impl fmt::Debug) -> String {
    let rendered = format!("{:?}", value);
    if rendered.chars().count() <= MAX_VALUE_CHARS {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(ABBREVIATED_CHARS).collect();
    cut.push_str("...");
    cut
}

impl<K, V, C> Cache<K, V> for LoggingCache<C>
where
    K: fmt::Debug,
    V: fmt::Debug,
    C: Cache<K, V>,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        if !self.is_enabled() {
            return self.inner.get(key);
        }

        let tracker = LatencyTracker::start();
        let result = self.inner.get(key);
        let nanos = tracker.elapsed_nanos();

        match &result {
            Ok(Some(value)) => self.log(LogLevel::Info, || {
                format!(
                    "GET hit: key={:?}, value={}, time={}ns",
                    key,
                    abbreviate(value),
                    nanos
                )
            }),
            Ok(None) => self.log(LogLevel::Info, || {
                format!("GET miss: key={:?}, time={}ns", key, nanos)
            }),
            Err(err) => self.log(LogLevel::Error, || {
                format!("GET error: key={:?}, error={}, time={}ns", key, err, nanos)
            }),
        }
        result
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        if !self.is_enabled() {
            return self.inner.put(key, value);
        }

        // Rendered up front; the value moves into the wrapped cache
        let key_text = format!("{:?}", key);
        let value_text = abbreviate(&value);

        let tracker = LatencyTracker::start();
        let result = self.inner.put(key, value);
        let nanos = tracker.elapsed_nanos();

        match &result {
            Ok(()) => self.log(LogLevel::Info, || {
                format!(
                    "PUT: key={}, value={}, time={}ns",
                    key_text, value_text, nanos
                )
            }),
            Err(err) => self.log(LogLevel::Error, || {
                format!(
                    "PUT error: key={}, value={}, error={}, time={}ns",
                    key_text, value_text, err, nanos
                )
            }),
        }
        result
    }

    fn remove(&self, key: &K) -> Result<()> {
        if !self.is_enabled() {
            return self.inner.remove(key);
        }

        let tracker = LatencyTracker::start();
        let result = self.inner.remove(key);
        let nanos = tracker.elapsed_nanos();

        match &result {
            Ok(()) => self.log(LogLevel::Info, || {
                format!("REMOVE: key={:?}, time={}ns", key, nanos)
            }),
            Err(err) => self.log(LogLevel::Error, || {
                format!("REMOVE error: key={:?}, error={}, time={}ns", key, err, nanos)
            }),
        }
        result
    }

    fn clear(&self) -> Result<()> {
        if !self.is_enabled() {
            return self.inner.clear();
        }

        let tracker = LatencyTracker::start();
        let before = self.inner.size();
        let result = self.inner.clear();
        let nanos = tracker.elapsed_nanos();

        match &result {
            Ok(()) => self.log(LogLevel::Warn, || {
                format!("CLEAR: cleared {} entries, time={}ns", before, nanos)
            }),
            Err(err) => self.log(LogLevel::Error, || {
                format!("CLEAR error: error={}, time={}ns", err, nanos)
            }),
        }
        result
    }

    fn size(&self) -> usize {
        if !self.should_log(LogLevel::Debug) {
            return self.inner.size();
        }

        let tracker = LatencyTracker::start();
        let size = self.inner.size();
        let nanos = tracker.elapsed_nanos();
        self.log(LogLevel::Debug, || {
            format!("SIZE: {}, time={}ns", size, nanos)
        });
        size
    }

    fn stats(&self) -> Option<StatsSnapshot> {
        self.inner.stats()
    }
}

impl<C> fmt::Debug for LoggingCache<C>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingCache")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("log_level", &self.log_level())
            .field("inner", &self.inner)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
