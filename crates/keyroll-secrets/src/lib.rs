//! Key resolution for keyroll
//!
//! This crate resolves symmetric payload keys through a two-tier cache:
//! - **Secret store**: durable, tag-queryable key records (HashiCorp Vault or in-memory)
//! - **Shared index**: namespace-scoped ordered set of key id -> last update, used to
//!   find the newest key without enumerating the store
//! - **Key provider**: in-process cache in front of both, resolving the active key
//!   and any historical key by id
//! - **Rotation**: creation of new key records and index reconciliation

pub mod blocking;
pub mod index;
pub mod naming;
pub mod provider;
pub mod reconcile;
pub mod rotation;
pub mod store;

pub use blocking::BlockingKeyProvider;
pub use index::{FileKeyIndex, IndexEntry, KeyIndex, MemoryKeyIndex};
pub use naming::KeyNaming;
pub use provider::{KeyProvider, ProviderSettings, ResolvedKey};
pub use reconcile::reconcile_index;
pub use rotation::KeyRotator;
pub use store::{MemorySecretStore, SecretProperties, SecretStore, VaultSecretStore};
