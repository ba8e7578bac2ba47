use thiserror::Error;

pub type Result<T> = std::result::Result<T, TypesError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid provider address: {0}")]
    InvalidProviderAddr(String),

    #[error("Invalid module address: {0}")]
    InvalidModuleAddr(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Invalid document name: {0}")]
    InvalidDocName(String),

    #[error("Unsupported CDKTF language: {0}")]
    InvalidLanguage(String),
}
