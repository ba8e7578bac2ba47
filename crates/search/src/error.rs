use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid index item: {0}")]
    InvalidItem(String),

    #[error("Parent item not found: {0}")]
    ParentNotFound(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] regindex_storage::StorageError),
}
