use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed registry file {file}: {source}")]
    MalformedFile {
        file: String,
        source: serde_json::Error,
    },

    #[error("Invalid address in registry: {0}")]
    InvalidAddr(#[from] regindex_types::TypesError),

    #[error("Registry root does not exist: {0}")]
    MissingRoot(String),

    #[error("Task join error: {0}")]
    JoinError(String),
}
