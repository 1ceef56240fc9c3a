//! Toolkit Configuration
//!
//! YAML description of a tier chain plus logging and monitoring settings:
//!
//! ```yaml
//! tiers: ["lru-stats:1000", "expiring:30000", "concurrent"]
//! segmented: false
//! segment_count: 16
//! monitor_interval_secs: 10
//! log:
//!   level: info
//!   json: false
//! ```
//!
//! Tier strings use the [`factory`](crate::factory) syntax, L1 first. Every
//! field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_SEGMENT_COUNT;
use crate::error::{Error, Result};
use crate::factory::CacheKind;

/// Most tiers a chain may have
pub const MAX_TIERS: usize = 3;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level (trace, debug, info, warn, error)
    pub level: String,
    /// Output logs as JSON
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Tier configuration strings, L1 first
    pub tiers: Vec<String>,
    /// Use the segment-locked two-level cache (two tiers only)
    pub segmented: bool,
    /// Segment locks of the segmented cache
    pub segment_count: usize,
    /// Registry report interval; 0 disables monitoring
    pub monitor_interval_secs: u64,
    /// Logging
    pub log: LogConfig,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            tiers: vec!["lru-stats:1000".to_string(), "concurrent".to_string()],
            segmented: false,
            segment_count: DEFAULT_SEGMENT_COUNT,
            monitor_interval_secs: 0,
            log: LogConfig::default(),
        }
    }
}

impl ToolkitConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Parsed tier kinds, L1 first
    pub fn tier_kinds(&self) -> Result<Vec<CacheKind>> {
        self.tiers.iter().map(|tier| tier.parse()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() || self.tiers.len() > MAX_TIERS {
            return Err(Error::InvalidConfig(format!(
                "between 1 and {} tiers required, got {}",
                MAX_TIERS,
                self.tiers.len()
            )));
        }

        for kind in self.tier_kinds()? {
            if !kind.is_thread_safe() {
                return Err(Error::InvalidConfig(format!(
                    "tier '{}' is not thread-safe",
                    kind
                )));
            }
        }

        if self.segmented && self.tiers.len() != 2 {
            return Err(Error::InvalidConfig(
                "segmented cache requires exactly 2 tiers".to_string(),
            ));
        }

        if self.segment_count == 0 {
            return Err(Error::InvalidConfig(
                "segment_count must be greater than 0".to_string(),
            ));
        }

        if self.log.level.parse::<tracing::Level>().is_err() {
            return Err(Error::InvalidConfig(format!(
                "unknown log level: {}",
                self.log.level
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[test]
    fn test_default_is_valid() {
        let config = ToolkitConfig::default();
        config.validate().unwrap();
        assert_eq!(config.segment_count, 16);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_full_document() {
        let config = ToolkitConfig::from_yaml_str(
            r#"
tiers: ["lru:100", "expiring:30000:1000", "concurrent:64"]
monitor_interval_secs: 5
log:
  level: debug
  json: true
"#,
        )
        .unwrap();

        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.monitor_interval_secs, 5);
        assert!(config.log.json);
        assert_eq!(
            config.tier_kinds().unwrap()[1],
            CacheKind::Expiring {
                ttl: Duration::from_millis(30_000),
                sweep_interval: Some(Duration::from_millis(1_000)),
            }
        );
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = ToolkitConfig::from_yaml_str("segmented: true").unwrap();
        assert!(config.segmented);
        assert_eq!(config.tiers, ToolkitConfig::default().tiers);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_invalid_documents() {
        assert_matches!(
            ToolkitConfig::from_yaml_str("tiers: []"),
            Err(Error::InvalidConfig(_))
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str(r#"tiers: ["lru:1", "lru:2", "lru:3", "lru:4"]"#),
            Err(Error::InvalidConfig(_))
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str("tiers: [simple, concurrent]"),
            Err(Error::InvalidConfig(msg)) if msg.contains("thread-safe")
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str("tiers: [\"lru:1\", \"lru:2\", concurrent]\nsegmented: true"),
            Err(Error::InvalidConfig(_))
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str("segment_count: 0"),
            Err(Error::InvalidConfig(_))
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str("log:\n  level: loud"),
            Err(Error::InvalidConfig(_))
        );
        assert_matches!(
            ToolkitConfig::from_yaml_str("tiers: 7"),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("tiercache-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "tiers: [\"lru:10\"]\n").unwrap();

        let config = ToolkitConfig::from_file(&path).unwrap();
        assert_eq!(config.tiers, vec!["lru:10".to_string()]);
        std::fs::remove_file(&path).unwrap();

        assert_matches!(ToolkitConfig::from_file(&path), Err(Error::Io(_)));
    }
}
