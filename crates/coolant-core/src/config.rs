/*!
 * Configuration management for coolant.
 *
 * Settings are layered: built-in defaults, then an optional TOML file, then
 * environment variables carrying a prefix (`COOLANT__DISCOVERY__SYSFS_ROOT`).
 */
use std::path::{Path, PathBuf};

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::Metadata;

/// Core configuration for coolant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format for logs
    #[serde(default)]
    pub json_format: bool,
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Mount point of sysfs
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Directory holding device nodes
    #[serde(default = "default_devfs_root")]
    pub devfs_root: PathBuf,

    /// Filter criteria applied to every discovery unless overridden
    #[serde(default)]
    pub filter: Metadata,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            devfs_root: default_devfs_root(),
            filter: Metadata::new(),
        }
    }
}

impl Config {
    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_app_name() -> String {
    "coolant".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}

fn default_devfs_root() -> PathBuf {
    PathBuf::from("/dev")
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    require_file: bool,
    environment_prefix: Option<String>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path; a missing file falls back to defaults
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self.require_file = false;
        self
    }

    /// Set the config file path; a missing file is an error
    pub fn with_required_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self.require_file = true;
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            if config_file.exists() {
                debug!("Loading configuration from {}", config_file.display());
                config_builder = config_builder.add_source(File::from(config_file.as_path()));
            } else if self.require_file {
                return Err(Error::config(format!(
                    "Configuration file {} does not exist",
                    config_file.display()
                )));
            } else {
                debug!(
                    "Configuration file {} does not exist, using defaults",
                    config_file.display()
                );
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        info!("Configuration loaded");
        Ok(config)
    }
}
