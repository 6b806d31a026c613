//! Payload encryption for keyroll
//!
//! Seals batches of messages under the active key from a
//! [`keyroll_secrets::KeyProvider`] and opens them again with whichever key
//! each message names.
//!
//! # Example
//!
//! ```ignore
//! let codec = EncryptionCodec::new(provider);
//! let sealed = codec.encode(vec![Message::new(b"hello".to_vec())]).await?;
//! let opened = codec.decode(sealed).await?;
//! ```

pub mod codec;
pub mod envelope;
pub mod message;

pub use codec::{EncryptionCodec, PayloadCodec};
pub use message::{Message, ENCODING_ENCRYPTED, METADATA_ENCODING, METADATA_KEY_ID};
