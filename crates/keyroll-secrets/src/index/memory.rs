//! In-process key index

use super::{slice_by_rank, upsert, IndexEntry, KeyIndex};
use async_trait::async_trait;
use keyroll_core::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key index held in memory
///
/// Sharing one instance through an `Arc` between several providers simulates
/// several processes racing on the same index.
#[derive(Debug, Default)]
pub struct MemoryKeyIndex {
    sets: RwLock<HashMap<String, Vec<IndexEntry>>>,
}

impl MemoryKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyIndex for MemoryKeyIndex {
    async fn delete_all(&self, key: &str) -> Result<()> {
        self.sets.write().await.remove(key);
        Ok(())
    }

    async fn add_many(&self, key: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut sets = self.sets.write().await;
        upsert(sets.entry(key.to_string()).or_default(), entries);
        Ok(())
    }

    async fn range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<IndexEntry>> {
        let sets = self.sets.read().await;
        Ok(sets
            .get(key)
            .map(|set| slice_by_rank(set, start, stop))
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
