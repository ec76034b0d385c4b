//! Configuration management for Lockslot GW
//!
//! Handles loading, parsing, and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Seconds between refresh poller ticks
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Slot store file name inside the state directory
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

/// Lock network transport selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Transport to drive; "console" logs commands instead of sending them
    #[serde(default = "default_transport_kind")]
    pub kind: String,
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.engine.refresh_interval_secs == 0 {
            anyhow::bail!("engine.refresh_interval_secs must be at least 1");
        }
        if self.engine.store_file.is_empty() {
            anyhow::bail!("engine.store_file cannot be empty");
        }

        match self.transport.kind.as_str() {
            "console" => {}
            other => anyhow::bail!("Unknown transport kind '{}' (expected 'console')", other),
        }

        Ok(())
    }

    /// Refresh poller cadence as a duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.engine.refresh_interval_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            store_file: default_store_file(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
        }
    }
}

// Default value functions
fn default_refresh_interval_secs() -> u64 {
    crate::poller::DEFAULT_REFRESH_INTERVAL_SECS
}
fn default_store_file() -> String {
    "slots.yaml".to_string()
}
fn default_transport_kind() -> String {
    "console".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.engine.refresh_interval_secs, 5);
        assert_eq!(config.engine.store_file, "slots.yaml");
        assert_eq!(config.transport.kind, "console");
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("engine:\n  refresh_interval_secs: 2\n").unwrap();
        assert_eq!(config.engine.refresh_interval_secs, 2);
        assert_eq!(config.engine.store_file, "slots.yaml");
        assert_eq!(config.transport.kind, "console");
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.engine.refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.kind = "zigbee".to_string();
        assert!(config.validate().is_err());
    }
}
