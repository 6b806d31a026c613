//! Rebuild the shared index from the secret store

use crate::index::{IndexEntry, KeyIndex};
use crate::naming::{timestamp_from_key_id, KeyNaming};
use crate::store::{SecretProperties, SecretStore};
use keyroll_core::Result;
use tracing::{debug, info};

/// Replace the namespace's index entries with the store's tagged records
///
/// The rewrite is delete-then-add and last-writer-wins across processes.
/// Returns the entries written, in store enumeration order.
pub async fn reconcile_index(
    store: &dyn SecretStore,
    index: &dyn KeyIndex,
    naming: &KeyNaming,
) -> Result<Vec<IndexEntry>> {
    let records = store
        .list_tagged(naming.tag(), naming.namespace())
        .await?;

    let entries: Vec<IndexEntry> = records
        .iter()
        .map(|record| entry_for(record, naming))
        .collect();

    index.delete_all(naming.index_key()).await?;
    index.add_many(naming.index_key(), &entries).await?;

    info!(
        "Reconciled {} index with {} keys from {} store for namespace '{}'",
        index.name(),
        entries.len(),
        store.name(),
        naming.namespace()
    );

    Ok(entries)
}

/// Index entry for a store record
///
/// The timestamp is the record's update time, else its creation time, else
/// the stamp embedded in the key id.
pub fn entry_for(record: &SecretProperties, naming: &KeyNaming) -> IndexEntry {
    let key_id = naming.key_id_from_storage(&record.name);
    let updated_at = match record.updated_at.or(record.created_at) {
        Some(ts) => ts,
        None => {
            debug!("Record '{}' has no timestamps, using key id", record.name);
            timestamp_from_key_id(key_id)
        }
    };
    IndexEntry::new(key_id, updated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryKeyIndex;
    use crate::naming::oldest_timestamp;
    use crate::store::MemorySecretStore;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn naming() -> KeyNaming {
        KeyNaming::new("orders", "payload-key-", "namespace", "keyroll:orders:keys")
    }

    fn props(name: &str, ns: &str) -> SecretProperties {
        SecretProperties {
            name: name.to_string(),
            created_at: None,
            updated_at: None,
            tags: HashMap::from([("namespace".to_string(), ns.to_string())]),
        }
    }

    #[test]
    fn test_entry_timestamp_fallbacks() {
        let naming = naming();
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut record = props("payload-key-k1", "orders");
        assert_eq!(entry_for(&record, &naming).updated_at(), oldest_timestamp());

        record.created_at = Some(created);
        assert_eq!(entry_for(&record, &naming).updated_at(), created);

        record.updated_at = Some(updated);
        let entry = entry_for(&record, &naming);
        assert_eq!(entry.updated_at(), updated);
        assert_eq!(entry.key_id, "k1");
    }

    #[test]
    fn test_entry_uses_id_stamp_without_timestamps() {
        let record = props("payload-key-ns-orders-20240102030405006", "orders");
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(6);

        assert_eq!(entry_for(&record, &naming()).updated_at(), expected);
    }

    #[tokio::test]
    async fn test_reconcile_replaces_stale_entries() {
        let naming = naming();
        let store = MemorySecretStore::new();
        let index = MemoryKeyIndex::new();

        index
            .add_many(naming.index_key(), &[IndexEntry::new("stale", Utc::now())])
            .await
            .unwrap();
        store.insert(props("payload-key-k1", "orders"), "AQID").await;
        store.insert(props("payload-key-other", "billing"), "AQID").await;

        let written = reconcile_index(&store, &index, &naming).await.unwrap();
        assert_eq!(written.len(), 1);

        let all = index.range_by_rank(naming.index_key(), 0, -1).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key_id, "k1");
    }

    #[tokio::test]
    async fn test_reconcile_empty_store_clears_index() {
        let naming = naming();
        let store = MemorySecretStore::new();
        let index = MemoryKeyIndex::new();
        index
            .add_many(naming.index_key(), &[IndexEntry::new("stale", Utc::now())])
            .await
            .unwrap();

        let written = reconcile_index(&store, &index, &naming).await.unwrap();

        assert!(written.is_empty());
        assert!(index
            .range_by_rank(naming.index_key(), 0, -1)
            .await
            .unwrap()
            .is_empty());
    }
}
