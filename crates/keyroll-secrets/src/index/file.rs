//! File-backed key index
//!
//! Each index key is stored as one JSON document inside the index directory.
//! Writes hold an exclusive lock on that document for their whole
//! read-modify-write cycle, so separate processes on one host can share it.
//! Reads take a shared lock and never create files; a missing document reads
//! as an empty index.

use super::{slice_by_rank, upsert, IndexEntry, KeyIndex};
use async_trait::async_trait;
use fs4::fs_std::FileExt;
use keyroll_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    key: String,
    entries: Vec<IndexEntry>,
}

/// Key index stored as locked JSON documents in a directory
#[derive(Debug, Clone)]
pub struct FileKeyIndex {
    dir: PathBuf,
}

impl FileKeyIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path for an index key
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_`.
    pub fn document_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    /// Run `op` on the document for `key` under an exclusive lock
    ///
    /// The document is rewritten when `op` returns `true`.
    async fn with_document<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut IndexDocument) -> (bool, T) + Send + 'static,
    {
        let dir = self.dir.clone();
        let path = self.document_path(key);
        let key = key.to_string();

        tokio::task::spawn_blocking(move || locked_update(&dir, &path, key, op))
            .await
            .map_err(|e| Error::index_unavailable(format!("index task failed: {}", e)))?
    }

    /// Read the entries for `key` under a shared lock
    async fn read_entries(&self, key: &str) -> Result<Vec<IndexEntry>> {
        let path = self.document_path(key);

        tokio::task::spawn_blocking(move || locked_read(&path))
            .await
            .map_err(|e| Error::index_unavailable(format!("index task failed: {}", e)))?
    }
}

fn locked_read(path: &Path) -> Result<Vec<IndexEntry>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error("open index", path, e)),
    };

    // Released when `file` is dropped
    file.lock_shared()
        .map_err(|e| io_error("lock index", path, e))?;

    Ok(read_document(&mut file, path)?.entries)
}

fn locked_update<T, F>(dir: &Path, path: &Path, key: String, op: F) -> Result<T>
where
    F: FnOnce(&mut IndexDocument) -> (bool, T),
{
    fs::create_dir_all(dir).map_err(|e| io_error("create index directory", dir, e))?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_error("open index", path, e))?;

    // Released when `file` is dropped
    file.lock_exclusive()
        .map_err(|e| io_error("lock index", path, e))?;

    let mut document = read_document(&mut file, path)?;
    if document.key.is_empty() {
        document.key = key;
    }

    let (changed, result) = op(&mut document);
    if changed {
        write_document(&mut file, path, &document)?;
        debug!(
            "Wrote {} index entries to {}",
            document.entries.len(),
            path.display()
        );
    }

    Ok(result)
}

fn read_document(file: &mut File, path: &Path) -> Result<IndexDocument> {
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| io_error("read index", path, e))?;

    if content.trim().is_empty() {
        return Ok(IndexDocument::default());
    }

    serde_json::from_str(&content).map_err(|e| {
        Error::index_unavailable(format!("corrupt index {}: {}", path.display(), e))
    })
}

fn write_document(file: &mut File, path: &Path, document: &IndexDocument) -> Result<()> {
    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| Error::serialization(format!("index document: {}", e)))?;

    file.set_len(0)
        .and_then(|_| file.seek(SeekFrom::Start(0)))
        .and_then(|_| file.write_all(&json))
        .and_then(|_| file.sync_all())
        .map_err(|e| io_error("write index", path, e))
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::index_unavailable(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl KeyIndex for FileKeyIndex {
    async fn delete_all(&self, key: &str) -> Result<()> {
        self.with_document(key, |doc| {
            let changed = !doc.entries.is_empty();
            doc.entries.clear();
            (changed, ())
        })
        .await
    }

    async fn add_many(&self, key: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let entries = entries.to_vec();
        self.with_document(key, move |doc| {
            upsert(&mut doc.entries, &entries);
            (true, ())
        })
        .await
    }

    async fn range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<IndexEntry>> {
        let entries = self.read_entries(key).await?;
        Ok(slice_by_rank(&entries, start, stop))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_path_is_sanitized() {
        let index = FileKeyIndex::new("/var/lib/keyroll");
        assert_eq!(
            index.document_path("keyroll:orders:keys"),
            PathBuf::from("/var/lib/keyroll/keyroll_orders_keys.json")
        );
        assert_eq!(
            index.document_path("../escape"),
            PathBuf::from("/var/lib/keyroll/.._escape.json")
        );
    }

    #[tokio::test]
    async fn test_read_of_missing_document_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("not-yet");
        let index = FileKeyIndex::new(&dir);

        assert!(index.range_by_rank("ns", 0, -1).await.unwrap().is_empty());
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_directory_is_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let index = FileKeyIndex::new(temp.path());
        index
            .add_many("ns", &[IndexEntry { key_id: "k1".to_string(), updated_at_ms: 1 }])
            .await
            .unwrap();

        let path = index.document_path("ns");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let entries = index.range_by_rank("ns", 0, -1).await;
        assert!(index.range_by_rank("other", 0, -1).await.unwrap().is_empty());

        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(entries.unwrap()[0].key_id, "k1");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let index = FileKeyIndex::new(temp.path());
        fs::write(index.document_path("ns"), "{not json").unwrap();

        let err = index.range_by_rank("ns", 0, -1).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("corrupt index"));
    }
}
