//! Shared key index
//!
//! The index is a namespace-keyed ordered set mapping key id to the key's last
//! update time in epoch milliseconds. Entries are ranked by score ascending
//! (ties by member), so rank `-1` is always the newest key.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use keyroll_core::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub use file::FileKeyIndex;
pub use memory::MemoryKeyIndex;

/// One member of the shared index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key_id: String,
    pub updated_at_ms: i64,
}

impl IndexEntry {
    pub fn new(key_id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            key_id: key_id.into(),
            updated_at_ms: updated_at.timestamp_millis(),
        }
    }

    /// Score as a timestamp, falling back to the oldest one when out of range
    pub fn updated_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.updated_at_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Ordered, namespace-keyed set of key ids scored by update time
#[async_trait]
pub trait KeyIndex: Send + Sync {
    /// Remove every entry under `key`
    async fn delete_all(&self, key: &str) -> Result<()>;

    /// Insert entries under `key`; an existing member takes the new score
    async fn add_many(&self, key: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Entries between two ranks, inclusive
    ///
    /// Negative ranks count from the end (`-1` is the last entry). Bounds past
    /// either end are clamped; an inverted range yields nothing.
    async fn range_by_rank(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<IndexEntry>>;

    /// Backend name for log messages
    fn name(&self) -> &'static str;
}

/// Ordering used by every backend
pub(crate) fn rank_order(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    a.updated_at_ms
        .cmp(&b.updated_at_ms)
        .then_with(|| a.key_id.cmp(&b.key_id))
}

/// Merge entries into a set, replacing the score of existing members
pub(crate) fn upsert(set: &mut Vec<IndexEntry>, entries: &[IndexEntry]) {
    for entry in entries {
        match set.iter_mut().find(|e| e.key_id == entry.key_id) {
            Some(existing) => existing.updated_at_ms = entry.updated_at_ms,
            None => set.push(entry.clone()),
        }
    }
    set.sort_by(rank_order);
}

/// Slice a rank-ordered set by inclusive, possibly negative, ranks
pub(crate) fn slice_by_rank(sorted: &[IndexEntry], start: isize, stop: isize) -> Vec<IndexEntry> {
    let len = sorted.len() as isize;
    if len == 0 {
        return Vec::new();
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return Vec::new();
    }

    sorted[start as usize..=stop as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, ms: i64) -> IndexEntry {
        IndexEntry {
            key_id: id.to_string(),
            updated_at_ms: ms,
        }
    }

    fn ids(entries: &[IndexEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key_id.as_str()).collect()
    }

    fn sample() -> Vec<IndexEntry> {
        let mut set = Vec::new();
        upsert(&mut set, &[entry("c", 30), entry("a", 10), entry("b", 20)]);
        set
    }

    #[test]
    fn test_upsert_orders_by_score() {
        assert_eq!(ids(&sample()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_upsert_replaces_score() {
        let mut set = sample();
        upsert(&mut set, &[entry("a", 40)]);
        assert_eq!(ids(&set), vec!["b", "c", "a"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_ties_ordered_by_member() {
        let mut set = Vec::new();
        upsert(&mut set, &[entry("k2", 5), entry("k1", 5)]);
        assert_eq!(ids(&set), vec!["k1", "k2"]);
    }

    #[test]
    fn test_slice_full_and_last() {
        let set = sample();
        assert_eq!(ids(&slice_by_rank(&set, 0, -1)), vec!["a", "b", "c"]);
        assert_eq!(ids(&slice_by_rank(&set, -1, -1)), vec!["c"]);
        assert_eq!(ids(&slice_by_rank(&set, 0, 0)), vec!["a"]);
    }

    #[test]
    fn test_slice_clamps_and_inverts() {
        let set = sample();
        assert_eq!(ids(&slice_by_rank(&set, -10, 100)), vec!["a", "b", "c"]);
        assert!(slice_by_rank(&set, 2, 1).is_empty());
        assert!(slice_by_rank(&set, 5, 10).is_empty());
        assert!(slice_by_rank(&set, 0, -5).is_empty());
        assert!(slice_by_rank(&[], 0, -1).is_empty());
    }

    #[test]
    fn test_entry_timestamp() {
        let now = Utc::now();
        let e = IndexEntry::new("k", now);
        assert_eq!(e.updated_at().timestamp_millis(), now.timestamp_millis());
    }
}
