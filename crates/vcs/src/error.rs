use thiserror::Error;

pub type Result<T> = std::result::Result<T, VcsError>;

#[derive(Error, Debug)]
pub enum VcsError {
    /// The remote repository is gone; the entity should be retired.
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// The tag is gone; the version should be dropped.
    #[error("Version not found in repository: {0}")]
    VersionNotFound(String),

    #[error("git {command} failed: {stderr}")]
    GitFailed { command: String, stderr: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unparsable tag date {raw}: {message}")]
    BadTagDate { raw: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl VcsError {
    pub fn is_repository_not_found(&self) -> bool {
        matches!(self, VcsError::RepositoryNotFound(_))
    }

    pub fn is_version_not_found(&self) -> bool {
        matches!(self, VcsError::VersionNotFound(_))
    }
}
