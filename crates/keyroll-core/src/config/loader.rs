//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (explicit path, or ~/.keyroll/config.yaml when present)
//! 3. Environment variables (KEYROLL_* and the standard VAULT_* variables)
//! 4. CLI flags (handled by caller)

use super::KeyringConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Directory searched for the default config file
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.keyroll)
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {:?}", p)))?;

        Ok(Self {
            config_dir: home.join(".keyroll"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Path of the default config file
    pub fn default_path(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Load configuration, optionally from an explicit file
    ///
    /// An explicit path must exist; the default path is only read when present.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<KeyringConfig> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config_not_found(path.as_str()));
                }
                Self::load_yaml_file(path)?
            }
            None => {
                let path = self.default_path();
                if path.exists() {
                    Self::load_yaml_file(&path)?
                } else {
                    debug!("No config file at {}, using defaults", path);
                    KeyringConfig::default()
                }
            }
        };

        config = Self::apply_env_overrides(config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Utf8Path) -> Result<KeyringConfig> {
        let content = fs::read_to_string(path)?;
        let config: KeyringConfig = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: KeyringConfig) -> Result<KeyringConfig> {
        if let Ok(val) = env::var("KEYROLL_NAMESPACE") {
            config.namespace = val;
        }

        if let Ok(val) = env::var("KEYROLL_ACTIVE_KEY_ID") {
            config.active_key_id = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = env::var("KEYROLL_ACTIVE_KEY_RECHECK_MS") {
            config.active_key_recheck_ms = Some(val.parse().map_err(|_| {
                Error::invalid_config("KEYROLL_ACTIVE_KEY_RECHECK_MS must be a valid number")
            })?);
        }

        if let Ok(val) = env::var("KEYROLL_INDEX_PATH") {
            config.index.path = val.into();
        }

        // Vault
        if let Ok(val) = env::var("VAULT_ADDR") {
            config.vault.address = val;
        }

        if let Ok(val) = env::var("VAULT_TOKEN") {
            config.vault.token = val;
        }

        if let Ok(val) = env::var("VAULT_NAMESPACE") {
            config.vault.namespace = Some(val);
        }

        if let Ok(val) = env::var("VAULT_TIMEOUT") {
            config.vault.timeout_secs = val
                .parse()
                .map_err(|_| Error::invalid_config("VAULT_TIMEOUT must be a valid number"))?;
        }

        Ok(config)
    }
}
