use crate::backend::StorageBackend;
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use regindex_types::StoragePath;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem-backed object store rooted at a directory.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn fs_path(&self, path: &StoragePath) -> PathBuf {
        let mut out = self.root.clone();
        for segment in path.segments() {
            out.push(segment);
        }
        out
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn read(&self, path: &StoragePath) -> Result<Vec<u8>> {
        match tokio::fs::read(self.fs_path(path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &StoragePath, bytes: &[u8]) -> Result<()> {
        let fs_path = self.fs_path(path);
        if let Some(parent) = fs_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&fs_path, bytes).await?;
        Ok(())
    }

    async fn remove_all(&self, prefix: &StoragePath) -> Result<()> {
        let fs_path = self.fs_path(prefix);
        match tokio::fs::remove_dir_all(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            // `prefix` may name a single object rather than a tree.
            Err(e) if e.kind() == ErrorKind::NotADirectory => {
                tokio::fs::remove_file(&fs_path).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> StoragePath {
        StoragePath::new(s).unwrap()
    }

    #[tokio::test]
    async fn read_absent_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let err = backend.read(&path("missing.json")).await.unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn write_creates_intermediate_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend
            .write(&path("a/b/c/file.json"), b"{}")
            .await
            .unwrap();
        assert_eq!(backend.read(&path("a/b/c/file.json")).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn remove_all_clears_subtree_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.write(&path("p/x/1.md"), b"one").await.unwrap();
        backend.write(&path("p/x/2.md"), b"two").await.unwrap();
        backend.write(&path("p/other.md"), b"keep").await.unwrap();

        backend.remove_all(&path("p/x")).await.unwrap();
        backend.remove_all(&path("p/x")).await.unwrap();

        assert!(backend.read(&path("p/x/1.md")).await.is_err());
        assert_eq!(backend.read(&path("p/other.md")).await.unwrap(), b"keep");
    }
}
