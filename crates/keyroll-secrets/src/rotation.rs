//! Key rotation
//!
//! Rotation writes a new key record and reconciles the shared index so every
//! provider polling the index picks the new key up. Old records are never
//! touched, which keeps historical payloads decryptable.
//!
//! Key ids carry millisecond resolution. When the id for the current
//! millisecond is already taken, the stamp moves forward one millisecond
//! until a free id is found.

use crate::index::KeyIndex;
use crate::naming::KeyNaming;
use crate::reconcile::reconcile_index;
use crate::store::SecretStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use keyroll_core::key::KEY_SIZE;
use keyroll_core::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Ids tried before rotation gives up on finding a free one
const MAX_ID_ATTEMPTS: u32 = 16;

/// Creates keys for one namespace
pub struct KeyRotator {
    store: Arc<dyn SecretStore>,
    index: Arc<dyn KeyIndex>,
    naming: KeyNaming,
}

impl KeyRotator {
    pub fn new(store: Arc<dyn SecretStore>, index: Arc<dyn KeyIndex>, naming: KeyNaming) -> Self {
        Self {
            store,
            index,
            naming,
        }
    }

    /// Create a new key and make it the newest index entry
    ///
    /// Returns the new key id.
    pub async fn rotate(&self) -> Result<String> {
        self.rotate_at(Utc::now()).await
    }

    async fn rotate_at(&self, now: DateTime<Utc>) -> Result<String> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut bytes[..]);
        let encoded = Zeroizing::new(BASE64.encode(&bytes[..]));

        let tags = HashMap::from([(
            self.naming.tag().to_string(),
            self.naming.namespace().to_string(),
        )]);

        let mut stamp = now;
        for _ in 0..MAX_ID_ATTEMPTS {
            let key_id = self.naming.new_key_id(stamp);
            let name = self.naming.storage_name(&key_id);
            stamp += Duration::milliseconds(1);

            if self.store.get(&name).await?.is_some() {
                debug!("Key id '{}' taken, trying the next millisecond", key_id);
                continue;
            }

            match self.store.create(&name, &encoded, &tags).await {
                Ok(()) => {}
                Err(Error::AlreadyExists { .. }) => {
                    debug!(
                        "Key id '{}' created concurrently, trying the next millisecond",
                        key_id
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }

            info!(
                "Created key '{}' in {} store for namespace '{}'",
                key_id,
                self.store.name(),
                self.naming.namespace()
            );

            reconcile_index(self.store.as_ref(), self.index.as_ref(), &self.naming).await?;
            return Ok(key_id);
        }

        Err(Error::invalid_state(format!(
            "no free key id for namespace '{}' after {} attempts",
            self.naming.namespace(),
            MAX_ID_ATTEMPTS
        )))
    }

    /// Create a first key when the namespace has none, then reconcile
    ///
    /// Returns whether a key was created.
    pub async fn seed(&self) -> Result<bool> {
        let existing = self
            .store
            .list_tagged(self.naming.tag(), self.naming.namespace())
            .await?;

        if existing.is_empty() {
            self.rotate().await?;
            return Ok(true);
        }

        info!(
            "Namespace '{}' already has {} keys",
            self.naming.namespace(),
            existing.len()
        );
        reconcile_index(self.store.as_ref(), self.index.as_ref(), &self.naming).await?;
        Ok(false)
    }
}
