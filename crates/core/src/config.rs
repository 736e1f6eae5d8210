//! Configuration management
//!
//! Handles loading and saving the s3p configuration file. The file lives at
//! `<config dir>/s3p/config.toml`; `S3P_CONFIG_DIR` overrides the directory.
//! A missing file yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default part size for multipart transfers (8 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default number of concurrent transfers during directory sync
pub const DEFAULT_CONCURRENCY: usize = 10;

const CONFIG_DIR_ENV: &str = "S3P_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub transfer: TransferConfig,
    pub retry: RetryConfig,
}

/// Connection settings for the object store endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Custom endpoint URL for S3-compatible services; `None` uses AWS
    pub endpoint: Option<String>,

    pub region: String,

    /// Static access key; when absent the SDK's default provider chain is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Use path-style addressing (`endpoint/bucket/key`)
    pub path_style: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            path_style: true,
        }
    }
}

impl StoreConfig {
    /// Check that the endpoint, if any, is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint)
                .map_err(|e| Error::InvalidConfig(format!("endpoint '{endpoint}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::InvalidConfig(format!(
                    "endpoint '{endpoint}' must use http or https"
                )));
            }
        }
        Ok(())
    }

    /// The static key pair, if configured
    ///
    /// Either key alone is an error. The check happens here rather than in
    /// `validate` so the keys can be written to the file one at a time.
    pub fn static_credentials(&self) -> Result<Option<(&str, &str)>> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Ok(Some((access, secret))),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidConfig(
                "access_key and secret_key must be set together".to_string(),
            )),
        }
    }
}

/// Tuning for multipart transfers and directory sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Part size in bytes for chunked get/put
    pub chunk_size: u64,

    /// Worker count for directory sync
    pub concurrency: usize,

    /// Directory for local bridge scratch files; defaults to the OS temp dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            scratch_dir: None,
        }
    }
}

impl TransferConfig {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Reject non-positive chunk size or concurrency
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "chunk_size must be a positive integer".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory where scratch files are allocated
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Retry policy applied by transfer port implementations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for the default config location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
                .join("s3p"),
        };
        Ok(Self::with_dir(dir))
    }

    /// Create a manager rooted at a specific directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: dir.as_ref().join(CONFIG_FILE_NAME),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config, returning defaults when the file does not exist
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read {}: {e}",
                self.config_path.display()
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.transfer.validate()?;
        config.store.validate()?;
        Ok(config)
    }

    /// Write the config, creating the directory if needed
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;
        tracing::debug!(path = %self.config_path.display(), "Saved config");
        Ok(())
    }
}
