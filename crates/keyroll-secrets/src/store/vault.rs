//! HashiCorp Vault secret store (KV v2)
//!
//! Each key record is a KV v2 secret at `<base_path>/<name>` holding
//! `{"value": "<base64>"}`. Tags live in the secret's custom metadata, and the
//! metadata timestamps provide creation and update times.
//!
//! Values are written with `cas = 0`, so Vault refuses to write over an
//! existing secret. The value and the tags are two requests. A secret whose
//! tag write failed exists untagged and is invisible to `list_tagged` until
//! the tags are written by hand; the failure is logged with the secret path.

use super::{SecretProperties, SecretStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyroll_core::{retry_with_policy, Error, Result, RetryPolicy, VaultSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use vaultrs::api::kv2::requests::{SetSecretMetadataRequest, SetSecretRequestOptions};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

#[derive(Debug, Serialize, Deserialize)]
struct KeyRecord {
    value: String,
}

/// Secret store backed by a Vault KV v2 mount
pub struct VaultSecretStore {
    client: VaultClient,
    mount: String,
    base_path: String,
    retry: RetryPolicy,
}

impl VaultSecretStore {
    /// Create a store from connection settings
    pub fn new(settings: &VaultSettings, retry: RetryPolicy) -> Result<Self> {
        if !settings.is_configured() {
            return Err(Error::invalid_config(
                "Vault not configured (VAULT_ADDR and VAULT_TOKEN required)",
            ));
        }

        let mut builder = VaultClientSettingsBuilder::default();
        builder.address(&settings.address);
        builder.token(&settings.token);
        builder.timeout(Some(settings.timeout()));

        if let Some(ns) = &settings.namespace {
            builder.namespace(Some(ns.clone()));
        }

        let client_settings = builder
            .build()
            .map_err(|e| Error::invalid_config(format!("Invalid Vault settings: {}", e)))?;
        let client = VaultClient::new(client_settings)
            .map_err(|e| Error::invalid_config(format!("Failed to create Vault client: {}", e)))?;

        Ok(Self {
            client,
            mount: settings.mount.clone(),
            base_path: settings.base_path.trim_matches('/').to_string(),
            retry,
        })
    }

    fn path_for(&self, name: &str) -> String {
        if self.base_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.base_path, name)
        }
    }

    async fn read_properties(&self, name: &str) -> Result<Option<SecretProperties>> {
        let path = &self.path_for(name);
        let result = retry_with_policy(&self.retry, "vault read metadata", || async move {
            match kv2::read_metadata(&self.client, &self.mount, path).await {
                Ok(metadata) => Ok(Some(metadata)),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(to_store_error(e)),
            }
        })
        .await?;

        Ok(result.map(|metadata| SecretProperties {
            name: name.to_string(),
            created_at: parse_time(&metadata.created_time),
            updated_at: parse_time(&metadata.updated_time),
            tags: metadata.custom_metadata.unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn create(
        &self,
        name: &str,
        base64_value: &str,
        tags: &HashMap<String, String>,
    ) -> Result<()> {
        let path = &self.path_for(name);
        let record = &KeyRecord {
            value: base64_value.to_string(),
        };

        retry_with_policy(&self.retry, "vault write", || async move {
            let options = SetSecretRequestOptions { cas: 0 };
            match kv2::set_with_options(&self.client, &self.mount, path, record, options).await {
                Ok(_) => Ok(()),
                Err(e) if is_cas_conflict(&e) => Err(Error::already_exists(name)),
                Err(e) => Err(to_store_error(e)),
            }
        })
        .await?;

        let tagged = retry_with_policy(&self.retry, "vault write metadata", || async move {
            let mut opts = SetSecretMetadataRequest::builder();
            opts.custom_metadata(tags.clone());
            kv2::set_metadata(&self.client, &self.mount, path, Some(&mut opts))
                .await
                .map_err(to_store_error)
        })
        .await;
        if let Err(e) = tagged {
            warn!(
                "Secret {}/{} written without tags and will not be listed: {}",
                self.mount, path, e
            );
            return Err(e);
        }

        debug!("Wrote secret {}/{}", self.mount, path);
        Ok(())
    }

    async fn list_tagged(&self, tag: &str, value: &str) -> Result<Vec<SecretProperties>> {
        let names = retry_with_policy(&self.retry, "vault list", || async move {
            match kv2::list(&self.client, &self.mount, &self.base_path).await {
                Ok(names) => Ok(names),
                Err(e) if is_not_found(&e) => Ok(Vec::new()),
                Err(e) => Err(to_store_error(e)),
            }
        })
        .await?;

        let mut listed = Vec::new();
        for name in names.iter().filter(|n| !n.ends_with('/')) {
            match self.read_properties(name).await? {
                Some(props) if props.has_tag(tag, value) => listed.push(props),
                Some(_) => {}
                None => warn!("Secret {} disappeared while listing", name),
            }
        }

        debug!(
            "Listed {} secrets tagged {}={} in {}/{}",
            listed.len(),
            tag,
            value,
            self.mount,
            self.base_path
        );
        Ok(listed)
    }

    async fn get(&self, name: &str) -> Result<Option<String>> {
        let path = &self.path_for(name);
        retry_with_policy(&self.retry, "vault read", || async move {
            match kv2::read::<KeyRecord>(&self.client, &self.mount, path).await {
                Ok(record) => Ok(Some(record.value)),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(to_store_error(e)),
            }
        })
        .await
    }

    fn name(&self) -> &'static str {
        "vault"
    }
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("mount", &self.mount)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

fn is_not_found(e: &ClientError) -> bool {
    matches!(e, ClientError::APIError { code: 404, .. })
}

/// Vault answers a failed check-and-set with 400 and a check-and-set message
fn is_cas_conflict(e: &ClientError) -> bool {
    match e {
        ClientError::APIError { code: 400, errors } => {
            errors.iter().any(|m| m.contains("check-and-set"))
        }
        _ => false,
    }
}

fn to_store_error(e: ClientError) -> Error {
    Error::store_unavailable(format!("vault: {}", e))
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VaultSettings {
        VaultSettings {
            address: "https://vault.example.com".to_string(),
            token: "test-token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unconfigured_vault_is_rejected() {
        let result = VaultSecretStore::new(&VaultSettings::default(), RetryPolicy::none());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("Vault not configured"),
            "Expected 'Vault not configured', got: {}",
            err
        );
    }

    #[test]
    fn test_path_for_uses_base_path() {
        let mut config = settings();
        config.base_path = "/keys/prod/".to_string();
        let store = VaultSecretStore::new(&config, RetryPolicy::none()).unwrap();
        assert_eq!(store.path_for("payload-key-a"), "keys/prod/payload-key-a");

        config.base_path = String::new();
        let store = VaultSecretStore::new(&config, RetryPolicy::none()).unwrap();
        assert_eq!(store.path_for("payload-key-a"), "payload-key-a");
    }

    #[test]
    fn test_not_found_classification() {
        let missing = ClientError::APIError {
            code: 404,
            errors: vec![],
        };
        let denied = ClientError::APIError {
            code: 403,
            errors: vec!["permission denied".to_string()],
        };

        assert!(is_not_found(&missing));
        assert!(!is_not_found(&denied));
        assert!(to_store_error(denied).is_transient());
    }

    #[test]
    fn test_cas_conflict_classification() {
        let conflict = ClientError::APIError {
            code: 400,
            errors: vec!["check-and-set parameter did not match the current version".to_string()],
        };
        let bad_request = ClientError::APIError {
            code: 400,
            errors: vec!["no data provided".to_string()],
        };

        assert!(is_cas_conflict(&conflict));
        assert!(!is_cas_conflict(&bad_request));
        assert!(!is_not_found(&conflict));
    }

    #[test]
    fn test_parse_time() {
        let ts = parse_time("2024-01-02T03:04:05.006789Z").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 6);
        assert_eq!(parse_time(""), None);
    }
}
