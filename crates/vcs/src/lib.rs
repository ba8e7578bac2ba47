//! # Regindex VCS
//!
//! Git access for the scraping pipeline: one shared clone per repository,
//! per-tag worktrees for safe parallel checkouts, tag dates, and browse URL
//! synthesis.
//!
//! The capability seam is two traits: [`VcsClient`] opens a repository by
//! URL, [`VcsRepository`] exposes the per-repository operations. `GitCli`
//! shells out to the `git` binary; [`mock::MockVcsClient`] serves fixture
//! trees for tests.

mod error;
mod git;
pub mod mock;
mod url;

pub use error::{Result, VcsError};
pub use git::{GitCli, GitRepository};
pub use url::RepoLink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regindex_types::VersionNumber;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Opens repositories; cloning on first access, refreshing afterwards.
#[async_trait]
pub trait VcsClient: Send + Sync {
    async fn open(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn VcsRepository>>;
}

/// Per-repository operations. A worktree's lifetime is scoped to the
/// processing of one version; callers must pair `add_worktree` with
/// `remove_worktree` on every path out.
#[async_trait]
pub trait VcsRepository: Send + Sync + std::fmt::Debug {
    /// Fetches tags; idempotent.
    async fn update(&self, cancel: &CancellationToken) -> Result<()>;

    /// Materializes a worktree for the version's tag, trying `TAG` then
    /// `vTAG`. A repeated add for the same version returns the existing path.
    async fn add_worktree(
        &self,
        version: &VersionNumber,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    async fn remove_worktree(&self, version: &VersionNumber) -> Result<()>;

    /// Commit date of the version's tag, trying `TAG` then `vTAG`.
    async fn tag_date(
        &self,
        version: &VersionNumber,
        cancel: &CancellationToken,
    ) -> Result<DateTime<Utc>>;

    /// Human browse URL for the version, `None` when the host has no known
    /// web UI. Never fails.
    fn version_browse_url(&self, version: &VersionNumber) -> Option<String>;

    /// Human view URL for one file at the version.
    fn file_view_url(&self, version: &VersionNumber, path: &str) -> Option<String>;
}
