//! # Configuration Management Module
//!
//! Persistent settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `scan_timeout_secs`: How long to look for a headband before giving up
//! - `connect_timeout_secs`: Bound on GATT connect and service discovery
//! - `device_name_prefixes`: Advertised names accepted as EEG headbands
//! - `export_dir`: Where recordings are written; defaults to the working directory
//! - `synthetic_tick_ms`: Packet interval of the synthetic headband
//! - `neurosity_bridge`: Address of the Neurosity raw-brainwave bridge
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/headband-eeg/config.toml
//! - Linux: ~/.config/headband-eeg/config.toml
//! - Windows: %APPDATA%\headband-eeg\config.toml
//!
//! Missing fields fall back to their defaults, so older files keep loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapter::MuseAdapterConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub device_name_prefixes: Vec<String>,
    pub export_dir: Option<PathBuf>,
    pub synthetic_tick_ms: u64,
    pub neurosity_bridge: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 10,
            connect_timeout_secs: 15,
            device_name_prefixes: vec![
                "Muse".to_string(),
                "Crown".to_string(),
                "Notion".to_string(),
            ],
            export_dir: None,
            // 12 samples per packet at 256 Hz
            synthetic_tick_ms: 47,
            neurosity_bridge: "127.0.0.1:9000".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("headband-eeg")
            .join("config.toml")
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;
        Ok(())
    }

    /// Prefixes only the Muse family advertises.
    fn muse_prefixes(&self) -> Vec<String> {
        self.device_name_prefixes
            .iter()
            .filter(|p| p.to_lowercase().starts_with("muse"))
            .cloned()
            .collect()
    }

    /// Scan and connect settings for the Muse adapter.
    pub fn muse_adapter_config(&self) -> MuseAdapterConfig {
        let mut prefixes = self.muse_prefixes();
        if prefixes.is_empty() {
            prefixes = MuseAdapterConfig::default().name_prefixes;
        }
        MuseAdapterConfig {
            name_prefixes: prefixes,
            scan_timeout: Duration::from_secs(self.scan_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..MuseAdapterConfig::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn synthetic_tick(&self) -> Duration {
        Duration::from_millis(self.synthetic_tick_ms.max(1))
    }

    /// Export directory, falling back to the working directory.
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
