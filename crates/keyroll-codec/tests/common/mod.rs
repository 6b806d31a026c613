//! Common test helpers for keyroll-codec integration tests

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyroll_codec::EncryptionCodec;
use keyroll_core::key::KEY_SIZE;
use chrono::{TimeZone, Utc};
use keyroll_secrets::{
    IndexEntry, KeyIndex, KeyNaming, KeyProvider, MemoryKeyIndex, MemorySecretStore,
    ProviderSettings, SecretProperties,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const INDEX_KEY: &str = "keyroll:orders:keys";

/// Store, index and codec wired together in memory
pub struct CodecFixture {
    pub store: Arc<MemorySecretStore>,
    pub index: Arc<MemoryKeyIndex>,
    pub codec: EncryptionCodec,
}

#[allow(dead_code)]
impl CodecFixture {
    pub fn new() -> Self {
        let store = Arc::new(MemorySecretStore::new());
        let index = Arc::new(MemoryKeyIndex::new());
        let codec = EncryptionCodec::new(Arc::new(Self::provider_over(&store, &index)));
        Self {
            store,
            index,
            codec,
        }
    }

    /// A separate provider sharing this fixture's store and index
    pub fn second_codec(&self) -> EncryptionCodec {
        EncryptionCodec::new(Arc::new(Self::provider_over(&self.store, &self.index)))
    }

    fn provider_over(store: &Arc<MemorySecretStore>, index: &Arc<MemoryKeyIndex>) -> KeyProvider {
        let naming = KeyNaming::new("orders", "payload-key-", "namespace", INDEX_KEY);
        KeyProvider::new(store.clone(), index.clone(), ProviderSettings::new(naming))
    }

    /// Add a key filled with `byte`, stored and published at `updated_at_ms`
    ///
    /// The store record carries the same time as the index entry so a
    /// reconcile keeps the order the test set up.
    pub async fn add_key(&self, key_id: &str, byte: u8, updated_at_ms: i64) {
        let stamp = Utc.timestamp_millis_opt(updated_at_ms).unwrap();
        let properties = SecretProperties {
            name: format!("payload-key-{}", key_id),
            created_at: Some(stamp),
            updated_at: Some(stamp),
            tags: HashMap::from([("namespace".to_string(), "orders".to_string())]),
        };
        self.store
            .insert(properties, BASE64.encode(vec![byte; KEY_SIZE]))
            .await;
        self.index
            .add_many(
                INDEX_KEY,
                &[IndexEntry {
                    key_id: key_id.to_string(),
                    updated_at_ms,
                }],
            )
            .await
            .unwrap();
    }
}
