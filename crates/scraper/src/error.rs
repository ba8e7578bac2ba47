use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScraperError>;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("storage error: {0}")]
    StorageError(#[from] regindex_storage::StorageError),

    #[error("invalid document tree: {0}")]
    TypesError(#[from] regindex_types::TypesError),

    #[error("scraping was cancelled")]
    Cancelled,
}

/// Schema extraction failures are soft: the caller records them on the
/// module document instead of aborting the version.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to launch schema extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("schema extractor exited with an error: {stderr}")]
    ExtractorFailed { stderr: String },

    #[error("schema extractor produced malformed output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("failed to provision the extractor binary: {0}")]
    Provisioning(String),

    #[error("schema extraction was cancelled")]
    Cancelled,
}
