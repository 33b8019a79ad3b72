//! Flasher configuration
//!
//! Configuration is a TOML file; every key is optional:
//!
//! ```toml
//! static_host_base = "https://roperscrossroads.github.io/tasticfw/firmware"
//! archive_base = "https://github.com/roperscrossroads/tasticfw/releases/download"
//! baud_rate = 921600
//!
//! [[preview_releases]]
//! id = "v2.9.0.preview"
//! title = "Preview 2.9.0"
//! zip_url = "https://example.org/firmware-2.9.0.zip"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::release::FirmwareArtifact;
use crate::transport::DEFAULT_BAUD_RATE;

/// Default per-release static binary host
pub const DEFAULT_STATIC_HOST_BASE: &str = "https://roperscrossroads.github.io/tasticfw/firmware";
/// Default release archive host
pub const DEFAULT_ARCHIVE_BASE: &str =
    "https://github.com/roperscrossroads/tasticfw/releases/download";
/// Default mirror used for archives that are not release archives
pub const DEFAULT_MIRROR_BASE: &str =
    "https://raw.githubusercontent.com/meshtastic/meshtastic.github.io/master";
/// Default release list document
pub const DEFAULT_RELEASE_LIST_URL: &str =
    "https://roperscrossroads.github.io/tasticfw/firmware-releases.json";
/// Locations searched when no config file is given
pub fn default_config_paths() -> [PathBuf; 2] {
    [
        PathBuf::from("meshflash.toml"),
        PathBuf::from("/etc/meshflash/config.toml"),
    ]
}

/// Settings shared by every command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlasherConfig {
    /// Base URL of the per-release static binary host
    pub static_host_base: String,
    /// Base URL of release archives
    pub archive_base: String,
    /// Base URL of the mirror used for non-release archives
    pub mirror_base: String,
    /// URL of the release list document
    pub release_list_url: String,
    /// Serial speed while flashing; the console is always read at
    /// [`DEFAULT_BAUD_RATE`]
    pub baud_rate: u32,
    /// Preview builds offered once advanced features are unlocked
    pub preview_releases: Vec<FirmwareArtifact>,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        Self {
            static_host_base: DEFAULT_STATIC_HOST_BASE.into(),
            archive_base: DEFAULT_ARCHIVE_BASE.into(),
            mirror_base: DEFAULT_MIRROR_BASE.into(),
            release_list_url: DEFAULT_RELEASE_LIST_URL.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            preview_releases: Vec::new(),
        }
    }
}

impl FlasherConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the configuration from `path`, or from the first default location
    /// that exists, or fall back to built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        for candidate in default_config_paths() {
            if candidate.is_file() {
                log::debug!("Loading config from {}", candidate.display());
                return Self::from_toml_file(&candidate);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = FlasherConfig::from_toml_str("").unwrap();
        assert_eq!(config, FlasherConfig::default());
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn test_parse_overrides() {
        let config = FlasherConfig::from_toml_str(
            r#"
            baud_rate = 921600
            static_host_base = "http://localhost/fw"

            [[preview_releases]]
            id = "v2.9.0"
            title = "Preview"
            "#,
        )
        .unwrap();
        assert_eq!(config.baud_rate, 921_600);
        assert_eq!(config.static_host_base, "http://localhost/fw");
        assert_eq!(config.archive_base, DEFAULT_ARCHIVE_BASE);
        assert_eq!(config.preview_releases.len(), 1);
        assert_eq!(config.preview_releases[0].id, "v2.9.0");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FlasherConfig::from_toml_str("baud = 9600").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = FlasherConfig::load(Some(Path::new("/nonexistent/meshflash.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
