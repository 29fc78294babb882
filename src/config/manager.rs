//! Configuration manager for loading and saving extraction settings
//!
//! Reads and writes `%APPDATA%\getexeicon\config.json`. Writes are atomic: the
//! JSON goes to a temporary file in the target directory, which is then
//! persisted over the old file.

use crate::config::models::ExtractorConfig;
use crate::error::{IconError, Result, StringError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name under the data directory
pub const APP_DIR_NAME: &str = "getexeicon";

/// Configuration manager
pub struct ConfigManager;

impl ConfigManager {
    /// Data directory of the application
    ///
    /// Returns: `%APPDATA%\getexeicon`, or `.\getexeicon` when APPDATA is unset
    pub fn get_data_dir() -> PathBuf {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join(APP_DIR_NAME)
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> PathBuf {
        Self::get_data_dir().join("config.json")
    }

    /// Load configuration from the default location
    pub fn load() -> Result<ExtractorConfig> {
        Self::load_from(&Self::get_config_path())
    }

    /// Load configuration from `path`
    ///
    /// A missing or unparseable file yields the default configuration. Other
    /// read failures are returned.
    pub fn load_from(path: &Path) -> Result<ExtractorConfig> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Configuration file not found, using defaults");
                return Ok(ExtractorConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<ExtractorConfig>(&json) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse configuration, using defaults: {}", e);
                Ok(ExtractorConfig::default())
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(config: &ExtractorConfig) -> Result<()> {
        Self::save_to(config, &Self::get_config_path())
    }

    /// Save configuration to `path` with an atomic write
    pub fn save_to(config: &ExtractorConfig, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| IconError::Config(StringError::new("Invalid config path")))?;
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(config)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| IconError::Io(e.error))?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}
