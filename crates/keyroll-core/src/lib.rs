//! Core library for keyroll
//!
//! Shared building blocks for the key provider and the payload codec:
//! - The error taxonomy used by every library crate
//! - Hierarchical configuration loading (defaults, YAML file, environment)
//! - Retry policy for transient store/index failures
//! - Zeroizing key material

pub mod config;
pub mod error;
pub mod key;
pub mod retry;

pub use config::{ConfigLoader, IndexSettings, KeyringConfig, RetrySettings, VaultSettings};
pub use error::{Error, Result};
pub use key::KeyMaterial;
pub use retry::{retry_with_policy, RetryPolicy};
