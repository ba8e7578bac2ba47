use thiserror::Error;

pub type Result<T> = std::result::Result<T, LicenseError>;

#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("License matcher failed: {0}")]
    MatcherFailed(String),
}
