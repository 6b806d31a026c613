//! In-process secret store

use super::{SecretProperties, SecretStore};
use async_trait::async_trait;
use chrono::Utc;
use keyroll_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredSecret {
    value: String,
    properties: SecretProperties,
}

/// Secret store held in memory
///
/// Enumeration follows name order. Shared between provider instances through
/// an `Arc`, it stands in for a remote store in tests and local runs.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<BTreeMap<String, StoredSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record with explicit properties
    pub async fn insert(&self, properties: SecretProperties, base64_value: impl Into<String>) {
        let mut secrets = self.secrets.write().await;
        secrets.insert(
            properties.name.clone(),
            StoredSecret {
                value: base64_value.into(),
                properties,
            },
        );
    }

    /// Remove a record, returning whether it existed
    pub async fn remove(&self, name: &str) -> bool {
        self.secrets.write().await.remove(name).is_some()
    }

    pub async fn len(&self) -> usize {
        self.secrets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.secrets.read().await.is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn create(
        &self,
        name: &str,
        base64_value: &str,
        tags: &HashMap<String, String>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(name) {
            return Err(Error::already_exists(name));
        }

        secrets.insert(
            name.to_string(),
            StoredSecret {
                value: base64_value.to_string(),
                properties: SecretProperties {
                    name: name.to_string(),
                    created_at: Some(now),
                    updated_at: Some(now),
                    tags: tags.clone(),
                },
            },
        );

        Ok(())
    }

    async fn list_tagged(&self, tag: &str, value: &str) -> Result<Vec<SecretProperties>> {
        let secrets = self.secrets.read().await;
        Ok(secrets
            .values()
            .filter(|s| s.properties.has_tag(tag, value))
            .map(|s| s.properties.clone())
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.secrets.read().await.get(name).map(|s| s.value.clone()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(ns: &str) -> HashMap<String, String> {
        HashMap::from([("namespace".to_string(), ns.to_string())])
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemorySecretStore::new();
        store.create("payload-key-a", "AQID", &tags("default")).await.unwrap();

        assert_eq!(store.get("payload-key-a").await.unwrap().as_deref(), Some("AQID"));
        assert_eq!(store.get("payload-key-b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_never_replaces() {
        let store = MemorySecretStore::new();
        store.create("a", "AQID", &tags("default")).await.unwrap();
        let before = store.list_tagged("namespace", "default").await.unwrap();

        let err = store.create("a", "CQkJ", &tags("other")).await.unwrap_err();
        assert!(matches!(&err, Error::AlreadyExists { name } if name == "a"));

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("AQID"));
        assert_eq!(store.list_tagged("namespace", "default").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_list_filters_by_tag() {
        let store = MemorySecretStore::new();
        store.create("a", "AQ==", &tags("default")).await.unwrap();
        store.create("b", "Ag==", &tags("other")).await.unwrap();
        store.create("c", "Aw==", &HashMap::new()).await.unwrap();

        let listed = store.list_tagged("namespace", "default").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a");
    }
}
