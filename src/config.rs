//! Configuration management for the federated catalog crawler
//!
//! A single TOML file configures every component. Each section falls back to
//! the defaults in [`crate::constants`], so an empty file (or no file at all)
//! yields a runnable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::cache::CacheConfig;
use crate::app::crawler::CrawlerConfig;
use crate::app::directory::FederatedCacheNode;
use crate::app::partition::PartitionConfig;
use crate::app::queue::WorkItemQueueConfig;
use crate::constants::{self, config as paths};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Work item queue settings
    pub queue: WorkItemQueueConfig,
    /// Per-crawler settings
    pub crawler: CrawlerConfig,
    /// Crawler pool and refill schedule
    pub partition: PartitionConfig,
    /// Offer cache settings
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Nodes making up the federation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<FederatedCacheNode>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when neither CLI flags nor `RUST_LOG` set one
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: constants::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with precedence:
    /// 1. Explicit path (must exist)
    /// 2. `./federated-catalog.toml`
    /// 3. `<user config dir>/federated-catalog/config.toml`
    /// 4. Built-in defaults
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check every section, reporting all problems at once
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        errors.extend(self.crawler.validation_errors());
        errors.extend(self.partition.validation_errors());
        errors.extend(self.cache.validation_errors());

        if self.logging.level.parse::<tracing::Level>().is_err() {
            errors.push(format!("logging.level '{}' is not a log level", self.logging.level));
        }

        let mut names = std::collections::HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                errors.push(format!("nodes: duplicate node name '{}'", node.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the default configuration to `path`, creating parent directories
    pub async fn write_default(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = Self::default().to_toml_string()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Wrote default configuration to: {}", path.display());
        Ok(())
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(paths::APP_DIR_NAME).join(paths::FILE_NAME))
    }

    /// Find a configuration file in the standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(paths::LOCAL_FILE_NAME)];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        None
    }

    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}
