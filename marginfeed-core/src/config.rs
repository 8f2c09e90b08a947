//! TOML configuration for the sync tool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no API token: set `api.token` in the config or the TUSHARE_TOKEN environment variable")]
    MissingToken,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root directory for cached tables.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Table API endpoint.
    pub endpoint: String,
    /// API token; falls back to `TUSHARE_TOKEN` when empty.
    pub token: String,
    /// Minimum milliseconds between provider calls.
    pub min_interval_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tushare.pro".into(),
            token: String::new(),
            min_interval_ms: 120,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api: ApiConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the API token: the config value, else `TUSHARE_TOKEN`.
    pub fn resolved_token(&self) -> Result<String, ConfigError> {
        if !self.api.token.is_empty() {
            return Ok(self.api.token.clone());
        }
        std::env::var("TUSHARE_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}
