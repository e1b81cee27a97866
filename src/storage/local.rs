//! Local filesystem storage implementation.
//!
//! Used when no bucket is configured. Keys map to paths under the root
//! directory (`inputs/` by default).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::ObjectStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write to a temp file, then rename over the target.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        Self::ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        Self::write_atomic(&path, bytes)
            .await
            .map_err(|e| AppError::persistence(format!("{}: {e}", path.display())))?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(crate::storage::join_key(prefix, name));
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn describe(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("nested/test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("nested/test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("nested/test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("a.json", b"{\"v\":1}").await.unwrap();
        storage.write_bytes("a.json", b"{}").await.unwrap();
        assert_eq!(storage.read_bytes("a.json").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn test_list_keys_sorted_files_only() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("raw/b.json", b"1").await.unwrap();
        storage.write_bytes("raw/a.json", b"1").await.unwrap();
        storage.write_bytes("raw/sub/c.json", b"1").await.unwrap();

        let keys = storage.list_keys("raw").await.unwrap();
        assert_eq!(keys, vec!["raw/a.json", "raw/b.json"]);
        assert!(storage.list_keys("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blocker"), b"file").unwrap();
        let storage = LocalStorage::new(tmp.path());

        let err = storage.write_bytes("blocker/x.json", b"{}").await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
