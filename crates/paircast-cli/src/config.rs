//! Paircast CLI configuration
//!
//! Loads `paircast.toml` from an explicit path or the platform config
//! directory, falling back to defaults when the file is absent. The file
//! carries the full engine configuration plus CLI-only settings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use paircast_core::config::PaircastConfig;

/// Complete configuration for the Paircast CLI application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Engine configuration (channels, reconnect timing, playback limits)
    pub core: PaircastConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Address of the local peer-connection service
    pub service_addr: String,

    /// Directory for the preference file; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            service_addr: "127.0.0.1:7743".to_string(),
            data_dir: None,
        }
    }
}

impl CliAppConfig {
    /// Load from `path`, or from the default location when `path` is None.
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.core.validate()?;
        Ok(config)
    }

    /// Directory for persisted preferences
    pub fn data_dir(&self) -> PathBuf {
        self.cli
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paircast")
        .join("paircast.toml")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paircast")
}
