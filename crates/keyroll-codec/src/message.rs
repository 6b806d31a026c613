//! Message model and canonical binary form

use keyroll_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::BTreeMap;

/// Metadata entry naming how the body is encoded
pub const METADATA_ENCODING: &str = "encoding";

/// Metadata entry carrying the id of the key that sealed the body
pub const METADATA_KEY_ID: &str = "encryption-key-id";

/// Encoding marker for sealed bodies
pub const ENCODING_ENCRYPTED: &[u8] = b"binary/encrypted";

/// String-keyed byte metadata plus a binary body
///
/// The codec only reads and writes [`METADATA_ENCODING`] and
/// [`METADATA_KEY_ID`]; every other entry is carried untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub metadata: BTreeMap<String, ByteBuf>,
    #[serde(default)]
    pub data: ByteBuf,
}

impl Message {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata: BTreeMap::new(),
            data: ByteBuf::from(data.into()),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.set_metadata(key, value);
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.metadata
            .insert(key.into(), ByteBuf::from(value.into()));
    }

    pub fn metadata_value(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(|v| v.as_slice())
    }

    /// Whether the body carries the sealed encoding marker
    pub fn is_encrypted(&self) -> bool {
        self.metadata_value(METADATA_ENCODING) == Some(ENCODING_ENCRYPTED)
    }

    /// Key id of a sealed message, if present, non-empty and UTF-8
    pub fn key_id(&self) -> Option<&str> {
        self.metadata_value(METADATA_KEY_ID)
            .and_then(|v| std::str::from_utf8(v).ok())
            .filter(|id| !id.is_empty())
    }

    /// Serialize to CBOR
    ///
    /// Metadata entries are written in key order, so equal messages encode
    /// to equal bytes.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| Error::serialization(format!("CBOR encode: {}", e)))?;
        Ok(buf)
    }

    pub fn from_canonical_bytes(data: &[u8]) -> Result<Self> {
        ciborium::from_reader(data).map_err(|e| Error::serialization(format!("CBOR decode: {}", e)))
    }
}
