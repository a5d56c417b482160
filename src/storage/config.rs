//! Configuration handling for citekeep
//!
//! Configuration is stored in `config.toml` under the platform config
//! directory (`~/.config/citekeep-cli/` on Linux), or wherever `--config` /
//! `CITEKEEP_CONFIG` points. It is read once at startup and never changes
//! while the process runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DoiKeyPolicy, Format, SortMode};
use crate::resolve::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Registry access settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Base URL DOIs are appended to
    pub registry_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after a transient failure
    pub retry_ceiling: u32,

    /// Delay before the first retry, doubled for each further one
    pub retry_backoff_ms: u64,

    /// Contact address sent in the user agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://doi.org".to_string(),
            timeout_secs: 20,
            retry_ceiling: 3,
            retry_backoff_ms: 500,
            mailto: None,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_ceiling, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn user_agent(&self) -> String {
        let base = format!("citekeep/{}", env!("CARGO_PKG_VERSION"));
        match &self.mailto {
            Some(mailto) => format!("{} (mailto:{})", base, mailto),
            None => base,
        }
    }
}

/// Library behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Whether one DOI in several formats shares a key
    pub doi_keys: DoiKeyPolicy,

    /// Default ordering for `list`
    pub sort: SortMode,

    /// Reverse the default ordering
    pub reverse: bool,

    /// Copy the library to `<file>.bak` when opening it
    pub backup_on_open: bool,

    /// Use full container titles instead of abbreviations in markdown
    pub full_container_titles: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            doi_keys: DoiKeyPolicy::Shared,
            sort: SortMode::Year,
            reverse: false,
            backup_on_open: true,
            full_container_titles: false,
        }
    }
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Format used when a command does not name one
    pub default_format: Format,

    /// Library file; defaults to `library.yaml` in the platform data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,

    pub network: NetworkConfig,

    pub library: LibraryConfig,
}

impl Config {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicitly given file must exist; a missing default file means
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Config file not found: {}", path.display()));
                }
                path.to_path_buf()
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to load config: {}", config_path.display()))
    }

    /// Parses and validates configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network.registry_url.trim().is_empty() {
            return Err(ConfigError::Invalid("network.registry_url is empty".into()));
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Returns the default library file path
    pub fn default_library_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().join("library.yaml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("dev", "citekeep", "citekeep-cli")
    }

    /// Returns the library file, configured or default
    pub fn library_file(&self) -> Result<PathBuf> {
        self.library_path
            .clone()
            .or_else(Self::default_library_path)
            .ok_or_else(|| anyhow!("Could not determine library location; set library_path"))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Writes the configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}
