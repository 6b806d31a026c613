//! JSON payload document read and written by `encode` / `decode`
//!
//! ```json
//! {"payloads": [{"metadata": {"encoding": "YmluYXJ5L3BsYWlu"}, "data": "aGVsbG8="}]}
//! ```
//!
//! Metadata values and data are base64 (standard alphabet, padded).

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyroll_codec::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PayloadDocument {
    pub payloads: Vec<WirePayload>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WirePayload {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
}

impl PayloadDocument {
    pub fn parse(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Failed to parse payload document")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize payload document")
    }

    pub fn into_messages(self) -> Result<Vec<Message>> {
        self.payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                payload
                    .into_message()
                    .with_context(|| format!("Invalid payload at index {}", i))
            })
            .collect()
    }

    pub fn from_messages(messages: &[Message]) -> Self {
        Self {
            payloads: messages.iter().map(WirePayload::from_message).collect(),
        }
    }
}

impl WirePayload {
    fn into_message(self) -> Result<Message> {
        let mut message = Message::new(
            BASE64
                .decode(&self.data)
                .context("data is not valid base64")?,
        );
        for (key, value) in self.metadata {
            let bytes = BASE64
                .decode(&value)
                .with_context(|| format!("metadata '{}' is not valid base64", key))?;
            message.set_metadata(key, bytes);
        }
        Ok(message)
    }

    fn from_message(message: &Message) -> Self {
        Self {
            metadata: message
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), BASE64.encode(v)))
                .collect(),
            data: BASE64.encode(&message.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let doc = PayloadDocument::parse(
            r#"{"payloads":[{"metadata":{"encoding":"anNvbi9wbGFpbg=="},"data":"aGVsbG8="},{}]}"#,
        )
        .unwrap();

        let messages = doc.into_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].data.as_slice(), b"hello");
        assert_eq!(messages[0].metadata_value("encoding"), Some(&b"json/plain"[..]));
        assert_eq!(messages[1], Message::default());
    }

    #[test]
    fn test_invalid_base64_names_the_payload() {
        let doc = PayloadDocument::parse(r#"{"payloads":[{"data":"aGk="},{"data":"%%%"}]}"#).unwrap();

        let err = doc.into_messages().unwrap_err();
        assert!(format!("{:#}", err).contains("index 1"));
    }

    #[test]
    fn test_messages_survive_the_document() {
        let messages = vec![Message::new(vec![0, 1, 2]).with_metadata("k", vec![9])];

        let json = PayloadDocument::from_messages(&messages).to_json().unwrap();
        let parsed = PayloadDocument::parse(&json).unwrap().into_messages().unwrap();
        assert_eq!(parsed, messages);
    }
}
