//! Cached key provider
//!
//! Resolves the active key and historical keys through a two-tier cache: an
//! in-process map of key id to key bytes, and the shared index in front of the
//! secret store.
//!
//! # Cache rules
//!
//! - A cached key is never re-fetched. Keys are immutable once created.
//! - Entries are never evicted individually; only [`KeyProvider::refresh`]
//!   clears the cache, and it clears all of it.
//! - The active key memo is filled from the whole index on first use. Later
//!   lookups poll the top of the index so a key rotated by another process
//!   becomes active without an explicit refresh.
//!
//! # Concurrency
//!
//! No lock is held across store or index calls. Two callers missing the same
//! key may both reconcile; the rebuild is idempotent, so both converge.

use crate::index::{IndexEntry, KeyIndex};
use crate::naming::KeyNaming;
use crate::reconcile::reconcile_index;
use crate::store::SecretStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyroll_core::{Error, KeyMaterial, KeyringConfig, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub naming: KeyNaming,
    /// Key id that always wins active-key resolution, even when stale
    pub active_key_override: Option<String>,
    /// Minimum interval between index polls; `None` polls on every lookup
    pub recheck: Option<Duration>,
}

impl ProviderSettings {
    pub fn new(naming: KeyNaming) -> Self {
        Self {
            naming,
            active_key_override: None,
            recheck: None,
        }
    }

    pub fn from_config(config: &KeyringConfig) -> Self {
        Self {
            naming: KeyNaming::from_config(config),
            active_key_override: config.active_key_id.clone(),
            recheck: config.active_key_recheck(),
        }
    }

    pub fn with_active_key_override(mut self, key_id: impl Into<String>) -> Self {
        self.active_key_override = Some(key_id.into());
        self
    }

    pub fn with_recheck(mut self, interval: Duration) -> Self {
        self.recheck = Some(interval);
        self
    }
}

/// Active key id together with its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub id: String,
    pub material: KeyMaterial,
}

#[derive(Debug, Clone)]
struct ActiveKey {
    id: String,
    updated_at_ms: i64,
}

#[derive(Debug, Default)]
struct CacheState {
    keys: HashMap<String, KeyMaterial>,
    active: Option<ActiveKey>,
    last_polled: Option<Instant>,
}

impl CacheState {
    /// Adopt `entry` as active if nothing is memoized or it is strictly newer
    fn consider(&mut self, entry: &IndexEntry) -> bool {
        let newer = match &self.active {
            None => true,
            Some(active) => entry.updated_at_ms > active.updated_at_ms,
        };
        if newer {
            self.active = Some(ActiveKey {
                id: entry.key_id.clone(),
                updated_at_ms: entry.updated_at_ms,
            });
        }
        newer
    }
}

/// Key provider over an injected secret store and shared index
pub struct KeyProvider {
    store: Arc<dyn SecretStore>,
    index: Arc<dyn KeyIndex>,
    settings: ProviderSettings,
    state: RwLock<CacheState>,
}

impl KeyProvider {
    pub fn new(
        store: Arc<dyn SecretStore>,
        index: Arc<dyn KeyIndex>,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            store,
            index,
            settings,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn naming(&self) -> &KeyNaming {
        &self.settings.naming
    }

    /// Id of the key used for new payloads
    ///
    /// A configured override always wins. Otherwise the newest index entry
    /// is used, reconciling the index from the store first when it is empty.
    pub async fn active_key_id(&self) -> Result<String> {
        if let Some(id) = &self.settings.active_key_override {
            return Ok(id.clone());
        }

        let polled = self.ensure_loaded().await?;
        if !polled {
            self.poll_for_newer().await?;
        }

        let state = self.state.read().await;
        state
            .active
            .as_ref()
            .map(|active| active.id.clone())
            .ok_or_else(|| Error::no_active_key(self.settings.naming.namespace()))
    }

    /// Bytes of the active key
    pub async fn active_key(&self) -> Result<KeyMaterial> {
        Ok(self.resolve_active().await?.material)
    }

    /// Active key id and bytes as one consistent pair
    pub async fn resolve_active(&self) -> Result<ResolvedKey> {
        let id = self.active_key_id().await?;
        let material = self.key(&id).await?;
        Ok(ResolvedKey { id, material })
    }

    /// Bytes of the key with the given id
    ///
    /// On a cache miss the index is reconciled and the cache checked again,
    /// then the store is asked directly.
    pub async fn key(&self, key_id: &str) -> Result<KeyMaterial> {
        if let Some(material) = self.cached(key_id).await {
            debug!("Key '{}' served from cache", key_id);
            return Ok(material);
        }

        debug!("Key '{}' not cached, refreshing", key_id);
        self.refresh().await?;
        if let Some(material) = self.cached(key_id).await {
            return Ok(material);
        }

        let name = self.settings.naming.storage_name(key_id);
        let encoded = self
            .store
            .get(&name)
            .await?
            .ok_or_else(|| Error::not_found(key_id))?;

        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::invalid_key_material(key_id, e.to_string()))?;
        let material = KeyMaterial::new(bytes);

        let mut state = self.state.write().await;
        let material = state
            .keys
            .entry(key_id.to_string())
            .or_insert(material)
            .clone();
        debug!("Cached key '{}' from {} store", key_id, self.store.name());

        Ok(material)
    }

    /// Clear the cache and rebuild the shared index from the store
    ///
    /// The active key becomes the newest reconciled entry. When the store
    /// holds no keys for the namespace, no key is active afterwards.
    pub async fn refresh(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = CacheState::default();
        }

        let entries = reconcile_index(
            self.store.as_ref(),
            self.index.as_ref(),
            &self.settings.naming,
        )
        .await?;

        let mut state = self.state.write().await;
        for entry in &entries {
            state.consider(entry);
        }
        state.last_polled = Some(Instant::now());

        match &state.active {
            Some(active) => info!(
                "Refreshed keys for namespace '{}', active key '{}'",
                self.settings.naming.namespace(),
                active.id
            ),
            None => info!(
                "Refreshed keys for namespace '{}', no keys found",
                self.settings.naming.namespace()
            ),
        }

        Ok(())
    }

    async fn cached(&self, key_id: &str) -> Option<KeyMaterial> {
        self.state.read().await.keys.get(key_id).cloned()
    }

    /// Fill the active memo from the index on first use
    ///
    /// Returns whether the index was read.
    async fn ensure_loaded(&self) -> Result<bool> {
        if self.state.read().await.active.is_some() {
            return Ok(false);
        }

        let key = self.settings.naming.index_key();
        let mut entries = self.index.range_by_rank(key, 0, -1).await?;
        if entries.is_empty() {
            debug!("Index {} is empty, reconciling from store", key);
            entries = reconcile_index(
                self.store.as_ref(),
                self.index.as_ref(),
                &self.settings.naming,
            )
            .await?;
        }

        let mut state = self.state.write().await;
        for entry in &entries {
            state.consider(entry);
        }
        state.last_polled = Some(Instant::now());

        Ok(true)
    }

    /// Check the top of the index for a key newer than the memoized one
    async fn poll_for_newer(&self) -> Result<()> {
        if let Some(interval) = self.settings.recheck {
            let last = self.state.read().await.last_polled;
            if last.is_some_and(|at| at.elapsed() < interval) {
                return Ok(());
            }
        }

        let top = self
            .index
            .range_by_rank(self.settings.naming.index_key(), -1, -1)
            .await?;

        let mut state = self.state.write().await;
        state.last_polled = Some(Instant::now());
        if let Some(entry) = top.first() {
            if state.consider(entry) {
                info!("Newer key '{}' found in index", entry.key_id);
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyProvider")
            .field("store", &self.store.name())
            .field("index", &self.index.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
