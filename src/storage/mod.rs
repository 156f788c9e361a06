//! Durable artifact storage
//!
//! [`ArtifactStore`] stores a local file under a key and hands back a
//! locator; fetching a locator yields a readable local path. Re-storing a key
//! overwrites it. [`LocalStore`] keeps artifacts under a directory and uses
//! `file://` locators.

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The operation may succeed if retried
    #[error("Transient storage failure for {target}: {source}")]
    Transient {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    fn from_io(target: impl Into<String>, source: io::Error) -> Self {
        let target = target.into();
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(target)
        } else {
            StorageError::Transient { target, source }
        }
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the file at `local_path` under `key`, returning its locator.
    async fn store(&self, local_path: &Path, key: &str) -> Result<String, StorageError>;

    /// Resolves a locator to a readable local path.
    async fn fetch(&self, locator: &str) -> Result<PathBuf, StorageError>;

    /// Stores in-memory bytes under `key`.
    async fn store_bytes(&self, bytes: &[u8], key: &str) -> Result<String, StorageError> {
        let staged = tempfile::NamedTempFile::new()
            .map_err(|e| StorageError::from_io(key, e))?;
        tokio::fs::write(staged.path(), bytes)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        self.store(staged.path(), key).await
    }
}

/// Directory-backed store
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn store(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let target = self.path_for(key)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Transient {
                    target: key.to_string(),
                    source: e,
                })?;
        }

        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| StorageError::from_io(local_path.display().to_string(), e))?;

        debug!("Stored {} as {}", local_path.display(), key);
        Ok(format!("{}{}", FILE_SCHEME, target.display()))
    }

    async fn fetch(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let path = match locator.strip_prefix(FILE_SCHEME) {
            Some(path) => PathBuf::from(path),
            None => self.path_for(locator)?,
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::NotFound(locator.to_string())),
            Err(e) => Err(StorageError::from_io(locator, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_fetch() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());

        let locator = store.store_bytes(b"payload", "sub-1/a.txt").await.unwrap();
        assert!(locator.starts_with("file://"));

        let path = store.fetch(&locator).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());

        let first = store.store_bytes(b"one", "k/file").await.unwrap();
        let second = store.store_bytes(b"two", "k/file").await.unwrap();
        assert_eq!(first, second);

        let path = store.fetch(&second).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());

        let err = store.fetch("nothing/here").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_store_missing_source_is_not_found() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());

        let err = store
            .store(Path::new("/nonexistent/file"), "k")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());

        for key in ["../escape", "/abs/path", "", "a/../../b"] {
            assert!(matches!(
                store.store_bytes(b"x", key).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
