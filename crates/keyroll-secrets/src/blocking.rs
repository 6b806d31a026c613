//! Blocking adapter over [`KeyProvider`]
//!
//! For synchronous callers only. Each call blocks the current thread on a
//! private current-thread runtime, so calling it from inside an async context
//! panics (tokio refuses nested `block_on`). Async code should use
//! [`KeyProvider`] directly.

use crate::provider::{KeyProvider, ResolvedKey};
use keyroll_core::{KeyMaterial, Result};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

/// Synchronous facade over a shared [`KeyProvider`]
pub struct BlockingKeyProvider {
    runtime: Runtime,
    inner: Arc<KeyProvider>,
}

impl BlockingKeyProvider {
    pub fn new(inner: Arc<KeyProvider>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime, inner })
    }

    /// The wrapped async provider
    pub fn inner(&self) -> &Arc<KeyProvider> {
        &self.inner
    }

    pub fn active_key_id(&self) -> Result<String> {
        self.runtime.block_on(self.inner.active_key_id())
    }

    pub fn active_key(&self) -> Result<KeyMaterial> {
        self.runtime.block_on(self.inner.active_key())
    }

    pub fn resolve_active(&self) -> Result<ResolvedKey> {
        self.runtime.block_on(self.inner.resolve_active())
    }

    pub fn key(&self, key_id: &str) -> Result<KeyMaterial> {
        self.runtime.block_on(self.inner.key(key_id))
    }

    pub fn refresh(&self) -> Result<()> {
        self.runtime.block_on(self.inner.refresh())
    }
}
