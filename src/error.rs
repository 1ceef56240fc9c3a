//! Error types for the tiered cache toolkit

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache toolkit
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid construction-time configuration (capacity, ttl, tier, config string)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid argument at the offending call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Lock Acquisition Errors
    // =========================================================================
    /// Bounded lock acquisition gave up
    #[error("Lock not acquired within {waited:?}")]
    LockTimeout { waited: Duration },

    /// Interruptible lock acquisition was cancelled
    #[error("Lock acquisition interrupted")]
    Interrupted,

    // =========================================================================
    // Loading Errors
    // =========================================================================
    /// Operation needs a loader but none was configured
    #[error("No loader configured")]
    NoLoader,

    /// Loader failed to produce a value
    #[error("Load failed: {0}")]
    Load(String),

    // =========================================================================
    // Observability Errors
    // =========================================================================
    /// Metrics exposition failed
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
