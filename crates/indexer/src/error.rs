use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("registry error: {0}")]
    Registry(#[from] regindex_registry::RegistryError),

    #[error("storage error: {0}")]
    Storage(#[from] regindex_storage::StorageError),

    #[error("version control error: {0}")]
    Vcs(#[from] regindex_vcs::VcsError),

    #[error("license detection error: {0}")]
    License(#[from] regindex_license::LicenseError),

    #[error("scraper error: {0}")]
    Scraper(#[from] regindex_scraper::ScraperError),

    #[error("search index error: {0}")]
    Search(#[from] regindex_search::SearchError),

    #[error("address error: {0}")]
    Types(#[from] regindex_types::TypesError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    JoinError(String),

    #[error("generation was cancelled")]
    Cancelled,
}

impl From<tokio::task::JoinError> for IndexerError {
    fn from(err: tokio::task::JoinError) -> Self {
        IndexerError::JoinError(err.to_string())
    }
}
