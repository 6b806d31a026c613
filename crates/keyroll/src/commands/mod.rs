//! CLI command implementations

pub mod codec;
pub mod keys;

use anyhow::{Context as _, Result};
use camino::Utf8PathBuf;
use keyroll_core::{ConfigLoader, KeyringConfig, RetryPolicy};
use keyroll_secrets::{
    FileKeyIndex, KeyIndex, KeyNaming, KeyProvider, KeyRotator, ProviderSettings, SecretStore,
    VaultSecretStore,
};
use std::sync::Arc;
use tracing::debug;

/// Global options shared by every command
pub struct Context {
    config_path: Option<Utf8PathBuf>,
    namespace: Option<String>,
}

/// Store and index built from configuration
pub struct Backends {
    pub config: KeyringConfig,
    pub store: Arc<dyn SecretStore>,
    pub index: Arc<dyn KeyIndex>,
}

impl Context {
    pub fn new(config_path: Option<Utf8PathBuf>, namespace: Option<String>) -> Self {
        Self {
            config_path,
            namespace,
        }
    }

    /// Load configuration and apply the `--namespace` flag
    pub fn load_config(&self) -> Result<KeyringConfig> {
        let loader = ConfigLoader::new()?;
        let mut config = loader.load(self.config_path.as_deref())?;

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
            config.validate()?;
        }

        debug!("Using namespace '{}'", config.namespace);
        Ok(config)
    }

    /// Connect the configured Vault store and file index
    pub fn backends(&self) -> Result<Backends> {
        let config = self.load_config()?;

        let store = VaultSecretStore::new(&config.vault, RetryPolicy::from(&config.retry))
            .context("Failed to set up Vault secret store")?;
        let index = FileKeyIndex::new(config.index.expanded_path());
        debug!("Using key index at {}", index.dir().display());

        Ok(Backends {
            config,
            store: Arc::new(store),
            index: Arc::new(index),
        })
    }
}

impl Backends {
    pub fn naming(&self) -> KeyNaming {
        KeyNaming::from_config(&self.config)
    }

    pub fn provider(&self) -> KeyProvider {
        KeyProvider::new(
            self.store.clone(),
            self.index.clone(),
            ProviderSettings::from_config(&self.config),
        )
    }

    pub fn rotator(&self) -> KeyRotator {
        KeyRotator::new(self.store.clone(), self.index.clone(), self.naming())
    }
}
