//! In-memory VCS double for tests: fixture trees keyed by tag, materialized
//! into real directories so the scraper can walk them.

use crate::error::{Result, VcsError};
use crate::url::RepoLink;
use crate::{VcsClient, VcsRepository};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regindex_types::VersionNumber;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MockTag {
    pub date: DateTime<Utc>,
    pub files: Vec<(String, Vec<u8>)>,
}

impl MockTag {
    pub fn new() -> Self {
        Self {
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            files: Vec::new(),
        }
    }

    pub fn dated(date: DateTime<Utc>) -> Self {
        Self {
            date,
            files: Vec::new(),
        }
    }

    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.to_string(), contents.into()));
        self
    }
}

impl Default for MockTag {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockRepoSpec {
    pub tags: BTreeMap<String, MockTag>,
}

impl MockRepoSpec {
    pub fn tag(mut self, name: &str, tag: MockTag) -> Self {
        self.tags.insert(name.to_string(), tag);
        self
    }
}

/// Serves [`MockRepoSpec`] fixtures; unknown URLs behave like deleted
/// repositories.
pub struct MockVcsClient {
    base: PathBuf,
    repos: Mutex<HashMap<String, MockRepoSpec>>,
    counter: Arc<AtomicU64>,
}

impl MockVcsClient {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            repos: Mutex::new(HashMap::new()),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn add_repo(&self, url: &str, spec: MockRepoSpec) {
        self.repos.lock().unwrap().insert(url.to_string(), spec);
    }

    pub fn remove_repo(&self, url: &str) {
        self.repos.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl VcsClient for MockVcsClient {
    async fn open(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<Arc<dyn VcsRepository>> {
        let spec = self
            .repos
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| VcsError::RepositoryNotFound(url.to_string()))?;
        Ok(Arc::new(MockRepository {
            spec,
            base: self.base.clone(),
            link: RepoLink::parse(url),
            counter: Arc::clone(&self.counter),
            active: Mutex::new(HashMap::new()),
        }))
    }
}

#[derive(Debug)]
pub struct MockRepository {
    spec: MockRepoSpec,
    base: PathBuf,
    link: Option<RepoLink>,
    counter: Arc<AtomicU64>,
    active: Mutex<HashMap<String, PathBuf>>,
}

impl MockRepository {
    fn find_tag(&self, version: &VersionNumber) -> Result<(String, MockTag)> {
        let id = version.to_string();
        for candidate in [id.clone(), format!("v{id}")] {
            if let Some(tag) = self.spec.tags.get(&candidate) {
                return Ok((candidate, tag.clone()));
            }
        }
        Err(VcsError::VersionNotFound(id))
    }
}

#[async_trait]
impl VcsRepository for MockRepository {
    async fn update(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn add_worktree(
        &self,
        version: &VersionNumber,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let key = version.to_string();
        if let Some(existing) = self.active.lock().unwrap().get(&key) {
            return Ok(existing.clone());
        }

        let (_, tag) = self.find_tag(version)?;
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        let dir = self.base.join(format!("worktree-{id}-{key}"));
        for (rel, contents) in &tag.files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, contents).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        self.active.lock().unwrap().insert(key, dir.clone());
        Ok(dir)
    }

    async fn remove_worktree(&self, version: &VersionNumber) -> Result<()> {
        let Some(dir) = self.active.lock().unwrap().remove(&version.to_string()) else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn tag_date(
        &self,
        version: &VersionNumber,
        _cancel: &CancellationToken,
    ) -> Result<DateTime<Utc>> {
        self.find_tag(version).map(|(_, tag)| tag.date)
    }

    fn version_browse_url(&self, version: &VersionNumber) -> Option<String> {
        let tag = self
            .find_tag(version)
            .map(|(name, _)| name)
            .unwrap_or_else(|_| format!("v{version}"));
        self.link.as_ref()?.browse_url(&tag)
    }

    fn file_view_url(&self, version: &VersionNumber, path: &str) -> Option<String> {
        let tag = self
            .find_tag(version)
            .map(|(name, _)| name)
            .unwrap_or_else(|_| format!("v{version}"));
        self.link.as_ref()?.file_url(&tag, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn worktrees_materialize_and_clean_up() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockVcsClient::new(dir.path());
        client.add_repo(
            "https://github.com/acme/foo",
            MockRepoSpec::default()
                .tag("v1.0.0", MockTag::new().file("docs/index.md", "# hi")),
        );

        let cancel = CancellationToken::new();
        let repo = client
            .open("https://github.com/acme/foo", &cancel)
            .await
            .unwrap();
        let version = VersionNumber::parse("1.0.0").unwrap();
        let worktree = repo.add_worktree(&version, &cancel).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(worktree.join("docs/index.md")).unwrap(),
            "# hi"
        );

        // Repeated add returns the same path.
        let again = repo.add_worktree(&version, &cancel).await.unwrap();
        assert_eq!(worktree, again);

        repo.remove_worktree(&version).await.unwrap();
        assert!(!worktree.exists());
    }

    #[tokio::test]
    async fn unknown_repo_and_tag_classify() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockVcsClient::new(dir.path());
        client.add_repo("https://github.com/acme/foo", MockRepoSpec::default());

        let cancel = CancellationToken::new();
        let missing = client.open("https://github.com/acme/gone", &cancel).await;
        assert!(missing.unwrap_err().is_repository_not_found());

        let repo = client
            .open("https://github.com/acme/foo", &cancel)
            .await
            .unwrap();
        let version = VersionNumber::parse("9.9.9").unwrap();
        let err = repo.add_worktree(&version, &cancel).await.unwrap_err();
        assert!(err.is_version_not_found());
    }
}
