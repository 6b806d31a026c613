//! Error types for keyroll

use thiserror::Error;

/// Result type alias using keyroll's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by key resolution, the payload codec and configuration loading
#[derive(Error, Debug)]
pub enum Error {
    /// The secret store or the shared index could not be reached
    #[error("{resource} unavailable: {message}")]
    TransientStore {
        resource: &'static str,
        message: String,
    },

    /// Key id absent after reconciliation and a direct store lookup
    #[error("Key '{id}' not found in secret store")]
    NotFound { id: String },

    /// A secret with this name already exists and records are never overwritten
    #[error("Secret '{name}' already exists")]
    AlreadyExists { name: String },

    /// Malformed message or envelope
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// AEAD tag mismatch while decrypting
    #[error("Authentication failed for payload encrypted with key '{key_id}'")]
    AuthenticationFailure { key_id: String },

    /// No key exists for the namespace and no override is configured
    #[error("No active key for namespace '{namespace}'")]
    NoActiveKey { namespace: String },

    /// Stored key value cannot be used as key material
    #[error("Invalid key material for '{id}': {reason}")]
    InvalidKeyMaterial { id: String, reason: String },

    /// Canonical binary form could not be produced or parsed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transient error for the secret store
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::TransientStore {
            resource: "secret store",
            message: message.into(),
        }
    }

    /// Create a transient error for the shared key index
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::TransientStore {
            resource: "key index",
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an already exists error
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an authentication failure error
    pub fn authentication_failure(key_id: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            key_id: key_id.into(),
        }
    }

    /// Create a no active key error
    pub fn no_active_key(namespace: impl Into<String>) -> Self {
        Self::NoActiveKey {
            namespace: namespace.into(),
        }
    }

    /// Create an invalid key material error
    pub fn invalid_key_material(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// Whether this error reports a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
