//! Framework configuration
//!
//! The configuration lives in a TOML file:
//!
//! ```toml
//! [encryption]
//! secret = "abcdefghijklmnop"
//!
//! [store]
//! path = "/var/lib/valtimo/plugin-configurations.json"
//!
//! [logging]
//! verbosity = 1
//! json = false
//!
//! [placeholders]
//! MY_URL_PLACEHOLDER = "https://www.example.com/"
//! ```
//!
//! `VALTIMO_PLUGIN_CONFIG` points at an alternative file, and the encryption
//! secret and store path can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "VALTIMO_PLUGIN_CONFIG";
pub const SECRET_ENV: &str = "VALTIMO_PLUGIN_ENCRYPTION_SECRET";
pub const STORE_ENV: &str = "VALTIMO_PLUGIN_STORE";

/// Required length of the encryption secret in bytes (AES-128)
pub const SECRET_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No encryption secret configured. Set [encryption] secret or VALTIMO_PLUGIN_ENCRYPTION_SECRET")]
    MissingSecret,

    #[error("Encryption secret must be exactly 16 bytes, got {0}")]
    InvalidSecretLength(usize),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<u8>,
    #[serde(default)]
    pub json: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub encryption: EncryptionSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Values for `${NAME}` placeholders, consulted before the environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub placeholders: BTreeMap<String, String>,
}

impl Config {
    /// Resolve the configuration file path.
    pub fn path() -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        dirs::config_dir().map_or_else(
            || PathBuf::from(".config/valtimo/valtimo-plugin.toml"),
            |c| c.join("valtimo").join("valtimo-plugin.toml"),
        )
    }

    /// Load from the default location with environment overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path, returning defaults if the file doesn't exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "configuration file not found, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from an environment-like lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(secret) = non_empty(SECRET_ENV) {
            self.encryption.secret = Some(secret);
        }
        if let Some(path) = non_empty(STORE_ENV) {
            self.store.path = Some(path);
        }
    }

    /// The encryption secret, validated to be usable as an AES-128 key.
    pub fn encryption_secret(&self) -> Result<&str, ConfigError> {
        let secret = self
            .encryption
            .secret
            .as_deref()
            .ok_or(ConfigError::MissingSecret)?;
        if secret.len() != SECRET_LENGTH {
            return Err(ConfigError::InvalidSecretLength(secret.len()));
        }
        Ok(secret)
    }

    /// Path of the configuration repository file.
    pub fn store_path(&self) -> PathBuf {
        if let Some(ref path) = self.store.path {
            return PathBuf::from(path);
        }

        dirs::data_dir().map_or_else(
            || PathBuf::from(".local/share/valtimo/plugin-configurations.json"),
            |d| d.join("valtimo").join("plugin-configurations.json"),
        )
    }

    pub fn verbosity(&self) -> u8 {
        self.logging.verbosity.unwrap_or(0)
    }
}
