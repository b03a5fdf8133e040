//! Configuration file support.
//!
//! Configuration is loaded from `<config dir>/peds-resus/config.toml`. Every
//! field has a default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DATABASE_NAME;

/// Directory name used under the platform config and data dirs.
const APP_DIR: &str = "peds-resus";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cpr: CprConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where on-device data lives
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default = "default_patient_file")]
    pub patient_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_name: default_database_name(),
            patient_file: default_patient_file(),
        }
    }
}

impl StorageConfig {
    /// Storage rooted at a directory, with default file names.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_name)
    }

    pub fn patient_path(&self) -> PathBuf {
        self.data_dir.join(&self.patient_file)
    }
}

/// CPR timer parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CprConfig {
    /// Compressions considered by the rate calculation
    #[serde(default = "default_rate_window")]
    pub rate_window: usize,

    /// Interval between ticker updates
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for CprConfig {
    fn default() -> Self {
        Self {
            rate_window: default_rate_window(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default level, overridden by RUST_LOG
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_database_name() -> String {
    DATABASE_NAME.to_string()
}

fn default_patient_file() -> String {
    "patient.json".to_string()
}

fn default_rate_window() -> usize {
    10
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.database_name, "peds-resus.db");
        assert_eq!(config.storage.patient_file, "patient.json");
        assert_eq!(config.cpr.rate_window, 10);
        assert_eq!(config.cpr.tick_interval_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[cpr]
rate_window = 6
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cpr.rate_window, 6);
        assert_eq!(config.cpr.tick_interval_ms, 1000); // default
        assert_eq!(config.storage.database_name, "peds-resus.db");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage = StorageConfig::in_dir(dir.path());
        config.logging.level = "debug".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig::in_dir("/data");
        assert_eq!(storage.database_path(), PathBuf::from("/data/peds-resus.db"));
        assert_eq!(storage.patient_path(), PathBuf::from("/data/patient.json"));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cpr\nrate_window = ").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
