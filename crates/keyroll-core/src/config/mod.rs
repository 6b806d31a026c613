//! Configuration types and loading

mod loader;

pub use loader::ConfigLoader;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder substituted with the namespace in `index_key_template`
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

/// Top-level keyroll configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KeyringConfig {
    /// Logical partition scoping store queries and the index key
    pub namespace: String,

    /// Prefix prepended to key ids to form the storage-level secret name
    pub secret_prefix: String,

    /// Tag name carrying the namespace on every stored key
    pub namespace_tag: String,

    /// Template for the shared index key
    pub index_key_template: String,

    /// Key id that always wins active-key resolution when set
    pub active_key_id: Option<String>,

    /// Minimum interval between index polls for a newer key
    ///
    /// Unset means the index is polled on every active-key lookup.
    pub active_key_recheck_ms: Option<u64>,

    /// Vault connection used as the secret store
    pub vault: VaultSettings,

    /// Retry policy for transient store failures
    pub retry: RetrySettings,

    /// Shared index location
    pub index: IndexSettings,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            secret_prefix: "payload-key-".to_string(),
            namespace_tag: "namespace".to_string(),
            index_key_template: format!("keyroll:{}:keys", NAMESPACE_PLACEHOLDER),
            active_key_id: None,
            active_key_recheck_ms: None,
            vault: VaultSettings::default(),
            retry: RetrySettings::default(),
            index: IndexSettings::default(),
        }
    }
}

impl KeyringConfig {
    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::invalid_config("namespace must not be empty"));
        }
        if self.namespace.contains('/') {
            return Err(Error::invalid_config(format!(
                "namespace '{}' must not contain '/'",
                self.namespace
            )));
        }
        if !self.index_key_template.contains(NAMESPACE_PLACEHOLDER) {
            return Err(Error::invalid_config(format!(
                "index-key-template must contain {}",
                NAMESPACE_PLACEHOLDER
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_config("retry.max-attempts must be at least 1"));
        }
        if matches!(self.active_key_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(Error::invalid_config("active-key-id must not be blank"));
        }
        Ok(())
    }

    /// Interval between index polls, if time-boxed
    pub fn active_key_recheck(&self) -> Option<Duration> {
        self.active_key_recheck_ms.map(Duration::from_millis)
    }

    /// Render the shared index key for the configured namespace
    pub fn index_key(&self) -> String {
        self.index_key_template
            .replace(NAMESPACE_PLACEHOLDER, &self.namespace)
    }
}

/// HashiCorp Vault connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VaultSettings {
    pub address: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub namespace: Option<String>,
    /// KV v2 mount
    pub mount: String,
    /// Folder under the mount holding key records
    pub base_path: String,
    pub timeout_secs: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            token: String::new(),
            namespace: None,
            mount: "secret".to_string(),
            base_path: "keyroll".to_string(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("mount", &self.mount)
            .field("base_path", &self.base_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl VaultSettings {
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.token.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry settings for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// File-backed shared index settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexSettings {
    /// Directory holding one index document per namespace key
    pub path: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.keyroll/index"),
        }
    }
}

impl IndexSettings {
    /// Index directory with `~` expanded
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path.to_string_lossy()).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KeyringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_key(), "keyroll:default:keys");
        assert_eq!(config.active_key_recheck(), None);
    }

    #[test]
    fn test_validate_rejects_bad_namespace() {
        let config = KeyringConfig {
            namespace: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = KeyringConfig {
            namespace: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_template_without_placeholder() {
        let config = KeyringConfig {
            index_key_template: "keys".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("{namespace}"), "unexpected error: {}", err);
    }

    #[test]
    fn test_vault_token_not_serialized() {
        let mut config = KeyringConfig::default();
        config.vault.token = "s.super-secret".to_string();

        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert!(!yaml.contains("super-secret"));
    }
}
