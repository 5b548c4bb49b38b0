//! Filesystem file store

use async_trait::async_trait;
use docsign_core::{FileStore, StorageError};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Stores blobs under a root directory; paths handed out are relative keys
#[derive(Debug, Clone)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key inside the root, refusing anything that could escape it
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::Backend(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn backend(e: std::io::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(backend)?;
        }

        // write then rename so readers never see a partial file
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await.map_err(backend)?;
        tokio::fs::rename(&tmp, &path).await.map_err(backend)?;

        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(key.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::MissingFile(path.to_string()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(dir.path());

        let path = store.put("req-1/v1.pdf", b"%PDF-1.5".to_vec()).await.unwrap();
        assert_eq!(path, "req-1/v1.pdf");
        assert_eq!(store.get(&path).await.unwrap(), b"%PDF-1.5");
        assert!(!dir.path().join("req-1/v1.part").exists());

        store.remove(&path).await.unwrap();
        assert!(matches!(
            store.get(&path).await,
            Err(StorageError::MissingFile(_))
        ));
        // removing twice is fine
        store.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_escaping_keys_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(dir.path());
        for key in ["../outside.pdf", "/etc/passwd", "", "a/../../b"] {
            assert!(store.put(key, vec![1]).await.is_err(), "{}", key);
        }
    }
}
