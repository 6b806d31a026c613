//! Symmetric key material

use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Size of a generated data key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Key bytes that are zeroed once the last handle is dropped
///
/// Clones share the same allocation, so handing a key out of the provider
/// cache does not copy the secret.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Arc<Zeroizing<Vec<u8>>>,
}

impl KeyMaterial {
    /// Wrap raw key bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Zeroizing::new(bytes)),
        }
    }

    /// Get the raw bytes (use with caution)
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Get length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for KeyMaterial {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED {} bytes])", self.len())
    }
}
