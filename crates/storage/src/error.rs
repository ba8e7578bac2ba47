use regindex_types::StoragePath;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The object does not exist. Callers branch on this variant for
    /// create-vs-update decisions, so backends must never fold other I/O
    /// failures into it.
    #[error("Object not found: {0}")]
    NotFound(StoragePath),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(#[from] regindex_types::TypesError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("S3 error at {path}: {message}")]
    S3Error { path: String, message: String },

    #[error("Commit aborted: {0}")]
    CommitAborted(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
