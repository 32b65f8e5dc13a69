//! Configuration management for the storage read path
//!
//! TOML file support, environment variable overrides and defaults for the
//! series cursor and the shard scans it drives.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Series cursor settings
    #[serde(default)]
    pub read: ReadConfig,

    /// Shard scan settings
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Series cursor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadConfig {
    /// Upper bound on a request's series limit (0 = unbounded)
    #[serde(default = "default_max_series_limit")]
    pub max_series_limit: u64,

    /// Initial capacity of the cursor's reusable tag buffers
    #[serde(default = "default_tag_capacity")]
    pub tag_capacity: usize,
}

/// Shard scan configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Scan shards in parallel during field-key discovery
    #[serde(default = "default_true")]
    pub parallel_shard_scan: bool,

    /// Minimum number of shards before scanning in parallel
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

// Default value functions
fn default_max_series_limit() -> u64 { 0 }
fn default_tag_capacity() -> usize { 16 }
fn default_parallel_threshold() -> usize { 4 }
fn default_true() -> bool { true }

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_series_limit: default_max_series_limit(),
            tag_capacity: default_tag_capacity(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            parallel_shard_scan: true,
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;

        let config: Self = toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(limit) = std::env::var("TSDB_MAX_SERIES_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.read.max_series_limit = l;
            }
        }

        if let Ok(parallel) = std::env::var("TSDB_PARALLEL_SCAN") {
            if let Ok(p) = parallel.parse() {
                self.scan.parallel_shard_scan = p;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.read.tag_capacity > 4096 {
            return Err(Error::Configuration(
                "Tag capacity cannot exceed 4096".to_string(),
            ));
        }

        if self.scan.parallel_threshold == 0 {
            return Err(Error::Configuration(
                "Parallel threshold must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}
