//! Secret store trait and implementations

pub mod memory;
pub mod vault;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyroll_core::Result;
use std::collections::HashMap;

/// Properties of a stored secret, without its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretProperties {
    /// Storage-level secret name
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

impl SecretProperties {
    /// Whether the secret carries `tag = value`
    pub fn has_tag(&self, tag: &str, value: &str) -> bool {
        self.tags.get(tag).is_some_and(|v| v == value)
    }
}

/// Durable store of named secret records
///
/// Records are immutable from the provider's point of view: rotation writes a
/// new name rather than changing an old one.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Write a new secret with a base64 value and tags
    ///
    /// Fails with `AlreadyExists` when the name is taken; an existing
    /// record is never replaced.
    async fn create(
        &self,
        name: &str,
        base64_value: &str,
        tags: &HashMap<String, String>,
    ) -> Result<()>;

    /// Enumerate secrets carrying `tag = value`
    async fn list_tagged(&self, tag: &str, value: &str) -> Result<Vec<SecretProperties>>;

    /// Read the base64 value of a secret
    ///
    /// Returns Ok(None) when the store reports the secret absent.
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Backend name for log messages
    fn name(&self) -> &'static str;
}

pub use memory::MemorySecretStore;
pub use vault::VaultSecretStore;
