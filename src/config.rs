//! Config model and loading helpers.

use std::env;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::compress::CompressOptions;
use crate::core::{QueueConfig, Result, TransferError};

const ENV_API_URL: &str = "BAUKLAR_API_URL";
const ENV_API_TOKEN: &str = "BAUKLAR_API_TOKEN";

/// Top-level configuration stored in `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub queue: QueueConfig,
    /// Overrides `queue.compression` when present
    pub compression: Option<CompressOptions>,
    pub log: LogConfig,
}

/// Order backend connection.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Sent as a bearer token
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".to_string(),
            token: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(source)
            .map_err(|err| TransferError::Config(err.to_string()))?;

        if let Some(compression) = config.compression.clone() {
            config.queue.compression = compression;
        }
        config.queue.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `BAUKLAR_API_URL` / `BAUKLAR_API_TOKEN`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Ok(token) = env::var(ENV_API_TOKEN) {
            self.api.token = Some(token);
        }
        self
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| TransferError::Config(err.to_string()))
    }
}
