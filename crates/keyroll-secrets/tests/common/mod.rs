//! Common test helpers for keyroll-secrets integration tests
//!
//! - `Fixture`: shared in-memory store and index with helpers to seed keys
//! - `FailingStore`: a store that is always unreachable
//! - `CountingIndex`: an index wrapper recording how often it is read

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, TimeZone, Utc};
use keyroll_core::{Error, Result};
use keyroll_secrets::{
    IndexEntry, KeyIndex, KeyNaming, KeyProvider, KeyRotator, MemoryKeyIndex, MemorySecretStore,
    ProviderSettings, SecretProperties, SecretStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const NAMESPACE: &str = "orders";
pub const PREFIX: &str = "payload-key-";
pub const INDEX_KEY: &str = "keyroll:orders:keys";

pub fn naming() -> KeyNaming {
    KeyNaming::new(NAMESPACE, PREFIX, "namespace", INDEX_KEY)
}

/// Timestamp `minutes` after a fixed epoch, for ordering seeded keys
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

/// One store and one index shared by any number of providers
pub struct Fixture {
    pub store: Arc<MemorySecretStore>,
    pub index: Arc<MemoryKeyIndex>,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemorySecretStore::new()),
            index: Arc::new(MemoryKeyIndex::new()),
        }
    }

    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings::new(naming())
    }

    pub fn provider(&self) -> KeyProvider {
        self.provider_with(self.settings())
    }

    pub fn provider_with(&self, settings: ProviderSettings) -> KeyProvider {
        KeyProvider::new(self.store.clone(), self.index.clone(), settings)
    }

    pub fn rotator(&self) -> KeyRotator {
        KeyRotator::new(self.store.clone(), self.index.clone(), naming())
    }

    /// Store a namespace-tagged key with an explicit update time
    pub async fn seed_key(&self, key_id: &str, bytes: &[u8], updated_at: DateTime<Utc>) {
        let properties = SecretProperties {
            name: format!("{}{}", PREFIX, key_id),
            created_at: Some(updated_at),
            updated_at: Some(updated_at),
            tags: HashMap::from([("namespace".to_string(), NAMESPACE.to_string())]),
        };
        self.store.insert(properties, BASE64.encode(bytes)).await;
    }

    /// Publish an entry in the shared index, as another process would
    pub async fn publish(&self, key_id: &str, updated_at: DateTime<Utc>) {
        self.index
            .add_many(INDEX_KEY, &[IndexEntry::new(key_id, updated_at)])
            .await
            .unwrap();
    }
}

/// Secret store whose every call fails as unreachable
#[derive(Debug, Default)]
pub struct FailingStore {
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store_unavailable("connection refused"))
    }
}

#[async_trait]
impl SecretStore for FailingStore {
    async fn create(&self, _: &str, _: &str, _: &HashMap<String, String>) -> Result<()> {
        self.fail()
    }

    async fn list_tagged(&self, _: &str, _: &str) -> Result<Vec<SecretProperties>> {
        self.fail()
    }

    async fn get(&self, _: &str) -> Result<Option<String>> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Index wrapper counting `range_by_rank` calls
#[derive(Debug, Default)]
pub struct CountingIndex {
    pub inner: MemoryKeyIndex,
    pub reads: AtomicUsize,
}

#[allow(dead_code)]
impl CountingIndex {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyIndex for CountingIndex {
    async fn delete_all(&self, key: &str) -> Result<()> {
        self.inner.delete_all(key).await
    }

    async fn add_many(&self, key: &str, entries: &[IndexEntry]) -> Result<()> {
        self.inner.add_many(key, entries).await
    }

    async fn range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<IndexEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.range_by_rank(key, start, stop).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
