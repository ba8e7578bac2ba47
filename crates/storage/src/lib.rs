//! # Regindex Storage
//!
//! Object storage adapters plus the buffered transactional layer the
//! indexing run publishes through.
//!
//! ## Pipeline
//!
//! ```text
//! BufferedStorage (local staging + .index.json journal)
//!     │
//!     ├──> read  -- staging first, read-through to the backing store
//!     ├──> write -- staged locally, marked dirty
//!     └──> commit/rollback/recover
//!            └─> Storage (prefix handle)
//!                   ├──> LocalBackend (tokio::fs)
//!                   └──> S3Backend (aws-sdk-s3)
//! ```
//!
//! Nothing reaches the backing store outside of `commit`; a crash mid-commit
//! is resumed by `recover` from the journal.

mod backend;
mod buffer;
mod error;
mod local;
mod s3;

pub use backend::{content_type_for, StorageBackend};
pub use buffer::{BufferIndex, BufferedStorage, DirectoryNode, FileNode, INDEX_FILE_NAME};
pub use error::{Result, StorageError};
pub use local::LocalBackend;
pub use s3::{S3Backend, S3Settings};

pub use regindex_types::StoragePath;
use std::sync::Arc;

/// A handle over a backend, optionally rooted at a key prefix.
///
/// Cloning is cheap; `subdirectory` returns a handle that transparently
/// prefixes every operation.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    prefix: Option<StoragePath>,
}

impl Storage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            prefix: None,
        }
    }

    pub fn subdirectory(&self, prefix: &str) -> Result<Self> {
        let prefix = match &self.prefix {
            Some(existing) => existing.join(prefix)?,
            None => StoragePath::new(prefix)?,
        };
        Ok(Self {
            backend: Arc::clone(&self.backend),
            prefix: Some(prefix),
        })
    }

    fn resolve(&self, path: &StoragePath) -> Result<StoragePath> {
        match &self.prefix {
            Some(prefix) => Ok(prefix.join(path.as_str())?),
            None => Ok(path.clone()),
        }
    }

    pub async fn read(&self, path: &StoragePath) -> Result<Vec<u8>> {
        self.backend.read(&self.resolve(path)?).await
    }

    pub async fn write(&self, path: &StoragePath, bytes: &[u8]) -> Result<()> {
        self.backend.write(&self.resolve(path)?, bytes).await
    }

    pub async fn remove_all(&self, prefix: &StoragePath) -> Result<()> {
        self.backend.remove_all(&self.resolve(prefix)?).await
    }
}
