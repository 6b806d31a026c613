//! Payload codecs

use crate::envelope::{open, seal};
use crate::message::{Message, ENCODING_ENCRYPTED, METADATA_ENCODING, METADATA_KEY_ID};
use async_trait::async_trait;
use keyroll_core::{Error, Result};
use keyroll_secrets::KeyProvider;
use std::sync::Arc;
use tracing::debug;

/// Batch transform applied to messages on the way out and back in
///
/// `decode` must pass through messages it did not produce, so codecs can be
/// stacked.
#[async_trait]
pub trait PayloadCodec: Send + Sync {
    async fn encode(&self, messages: Vec<Message>) -> Result<Vec<Message>>;

    async fn decode(&self, messages: Vec<Message>) -> Result<Vec<Message>>;
}

/// Envelope encryption under the provider's keys
///
/// A batch is encoded under one active key. Decoding looks up each message's
/// key by the id stamped in its metadata, so messages sealed before a
/// rotation stay readable. Any failing item fails the whole call.
#[derive(Debug, Clone)]
pub struct EncryptionCodec {
    provider: Arc<KeyProvider>,
}

impl EncryptionCodec {
    pub fn new(provider: Arc<KeyProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<KeyProvider> {
        &self.provider
    }
}

#[async_trait]
impl PayloadCodec for EncryptionCodec {
    async fn encode(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        if messages.is_empty() {
            return Ok(messages);
        }

        let active = self.provider.resolve_active().await?;

        let encoded = messages
            .iter()
            .map(|message| {
                let plaintext = message.to_canonical_bytes()?;
                let body = seal(&active.material, &active.id, &plaintext)?;
                Ok(Message::new(body)
                    .with_metadata(METADATA_ENCODING, ENCODING_ENCRYPTED)
                    .with_metadata(METADATA_KEY_ID, active.id.as_bytes()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Encoded {} messages with key '{}'", encoded.len(), active.id);
        Ok(encoded)
    }

    async fn decode(&self, messages: Vec<Message>) -> Result<Vec<Message>> {
        let mut decoded = Vec::with_capacity(messages.len());

        for message in messages {
            if !message.is_encrypted() {
                decoded.push(message);
                continue;
            }

            let key_id = message.key_id().ok_or_else(|| {
                Error::invalid_state(format!(
                    "encrypted message has no '{}' metadata",
                    METADATA_KEY_ID
                ))
            })?;

            let key = self.provider.key(key_id).await?;
            let plaintext = open(&key, key_id, &message.data)?;
            decoded.push(Message::from_canonical_bytes(&plaintext)?);
        }

        Ok(decoded)
    }
}
