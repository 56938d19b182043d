//! Configuration module for statuswatch-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments, and
//! environment variables, and converting it into the core crate's runtime
//! types. An invalid configuration is the only process-fatal error class.

pub mod file;

use crate::config::file::FileConfig;
use statuswatch_core::poller::{DEFAULT_BACKOFF_BASE, PollerConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid summary url {url:?}: {source}")]
    InvalidSummaryUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("validation error: {0}")]
    Validation(String),
}

/// Validated runtime configuration.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub signing_secret: Option<Vec<u8>>,
    /// `Some` when the poller is enabled.
    pub poller: Option<PollerConfig>,
    pub dedup_capacity: usize,
    pub dedup_expiry: Duration,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and validate the configuration.
    ///
    /// A missing config file is not an error: the defaults describe a
    /// runnable webhook-only instance.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = if self.config_path.exists() {
            let content = std::fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!(path = ?self.config_path, "Config file not found, using defaults");
            FileConfig::default()
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;
        self.build_loaded_config(file_config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.poller.enabled {
            if config.poller.poll_interval_secs == 0 {
                return Err(ConfigError::Validation(
                    "poller.poll_interval_secs must be greater than zero".to_owned(),
                ));
            }
            if config.poller.cooldown_secs == 0 {
                return Err(ConfigError::Validation(
                    "poller.cooldown_secs must be greater than zero".to_owned(),
                ));
            }
            if config.poller.backoff_cap_secs == 0 {
                return Err(ConfigError::Validation(
                    "poller.backoff_cap_secs must be greater than zero".to_owned(),
                ));
            }
        }
        if config.dedup.capacity == 0 {
            return Err(ConfigError::Validation(
                "dedup.capacity must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    fn build_loaded_config(&self, file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        let poller = if file_config.poller.enabled {
            let summary_url = Url::parse(&file_config.poller.summary_url).map_err(|source| {
                ConfigError::InvalidSummaryUrl {
                    url: file_config.poller.summary_url.clone(),
                    source,
                }
            })?;
            Some(PollerConfig {
                summary_url,
                interval: Duration::from_secs(file_config.poller.poll_interval_secs),
                cooldown: Duration::from_secs(file_config.poller.cooldown_secs),
                backoff_base: DEFAULT_BACKOFF_BASE,
                backoff_cap: Duration::from_secs(file_config.poller.backoff_cap_secs),
            })
        } else {
            None
        };

        Ok(LoadedConfig {
            listen: file_config.server.listen,
            signing_secret: file_config
                .webhook
                .signing_secret
                .filter(|secret| !secret.is_empty())
                .map(String::into_bytes),
            poller,
            dedup_capacity: file_config.dedup.capacity,
            dedup_expiry: Duration::from_secs(file_config.dedup.expiry_days * 24 * 3600),
        })
    }
}

/// Durable dedup backend selector, read from the environment.
pub fn get_database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.is_empty())
}
