use crate::error::{Result, VcsError};
use crate::url::RepoLink;
use crate::{VcsClient, VcsRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regindex_types::VersionNumber;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Git access through the `git` binary.
///
/// One shared clone per repository under `work_dir`, no working tree; each
/// processed version gets its own detached worktree.
pub struct GitCli {
    work_dir: PathBuf,
}

impl GitCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn open(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn VcsRepository>> {
        let name = dir_name_for(url);
        let repo = GitRepository {
            url: url.to_string(),
            local_path: self.work_dir.join(&name),
            worktree_base: self.work_dir.join(format!("{name}.worktrees")),
            link: RepoLink::parse(url),
            worktrees: Mutex::new(HashMap::new()),
            resolved_tags: Mutex::new(HashMap::new()),
        };

        if repo.local_path.join(".git").exists() {
            repo.update(cancel).await?;
        } else {
            repo.clone_repo(cancel).await?;
        }
        Ok(Arc::new(repo))
    }
}

#[derive(Debug)]
pub struct GitRepository {
    url: String,
    local_path: PathBuf,
    worktree_base: PathBuf,
    link: Option<RepoLink>,
    worktrees: Mutex<HashMap<String, PathBuf>>,
    resolved_tags: Mutex<HashMap<String, String>>,
}

impl GitRepository {
    async fn clone_repo(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::fs::create_dir_all(
            self.local_path.parent().unwrap_or_else(|| Path::new(".")),
        )
        .await?;
        let target = self.local_path.to_string_lossy().to_string();
        let args = Self::clone_args(&self.url, &target);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = run_git(&args, None, cancel).await;
        match result {
            Ok(_) => Ok(()),
            Err(VcsError::GitFailed { stderr, .. }) if stderr_means_missing_repo(&stderr) => {
                Err(VcsError::RepositoryNotFound(self.url.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Blobless clone: every tag is present but file contents are only
    /// fetched when a worktree checks them out.
    fn clone_args(url: &str, target: &str) -> [String; 6] {
        [
            "clone".into(),
            "--quiet".into(),
            "--no-checkout".into(),
            "--filter=blob:none".into(),
            url.into(),
            target.into(),
        ]
    }

    fn tag_candidates(version: &VersionNumber) -> [String; 2] {
        let id = version.to_string();
        [id.clone(), format!("v{id}")]
    }

    async fn resolve_tag(
        &self,
        version: &VersionNumber,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if let Some(tag) = self.resolved_tags.lock().unwrap().get(&version.to_string()) {
            return Ok(tag.clone());
        }
        for candidate in Self::tag_candidates(version) {
            let reference = format!("refs/tags/{candidate}");
            let verify = run_git(
                &["rev-parse", "--quiet", "--verify", &reference],
                Some(&self.local_path),
                cancel,
            )
            .await;
            match verify {
                Ok(_) => {
                    self.resolved_tags
                        .lock()
                        .unwrap()
                        .insert(version.to_string(), candidate.clone());
                    return Ok(candidate);
                }
                Err(VcsError::GitFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(VcsError::VersionNotFound(version.to_string()))
    }
}

#[async_trait]
impl VcsRepository for GitRepository {
    async fn update(&self, cancel: &CancellationToken) -> Result<()> {
        run_git(
            &["fetch", "--quiet", "--tags", "--force", "--prune", "origin"],
            Some(&self.local_path),
            cancel,
        )
        .await
        .map(|_| ())
        .map_err(|e| match e {
            VcsError::GitFailed { stderr, .. } if stderr_means_missing_repo(&stderr) => {
                VcsError::RepositoryNotFound(self.url.clone())
            }
            other => other,
        })
    }

    async fn add_worktree(
        &self,
        version: &VersionNumber,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let key = version.to_string();
        if let Some(existing) = self.worktrees.lock().unwrap().get(&key) {
            return Ok(existing.clone());
        }

        let tag = self.resolve_tag(version, cancel).await?;
        let path = self.worktree_base.join(&key);
        tokio::fs::create_dir_all(&self.worktree_base).await?;
        let path_arg = path.to_string_lossy().to_string();
        let reference = format!("refs/tags/{tag}");
        run_git(
            &["worktree", "add", "--force", "--detach", &path_arg, &reference],
            Some(&self.local_path),
            cancel,
        )
        .await?;

        self.worktrees.lock().unwrap().insert(key, path.clone());
        Ok(path)
    }

    async fn remove_worktree(&self, version: &VersionNumber) -> Result<()> {
        let key = version.to_string();
        let Some(path) = self.worktrees.lock().unwrap().remove(&key) else {
            return Ok(());
        };
        let path_arg = path.to_string_lossy().to_string();
        let cancel = CancellationToken::new();
        let removed = run_git(
            &["worktree", "remove", "--force", &path_arg],
            Some(&self.local_path),
            &cancel,
        )
        .await;
        if removed.is_err() {
            // The directory may already be gone; make sure the checkout is.
            let _ = tokio::fs::remove_dir_all(&path).await;
            let _ = run_git(&["worktree", "prune"], Some(&self.local_path), &cancel).await;
        }
        Ok(())
    }

    async fn tag_date(
        &self,
        version: &VersionNumber,
        cancel: &CancellationToken,
    ) -> Result<DateTime<Utc>> {
        let tag = self.resolve_tag(version, cancel).await?;
        let reference = format!("refs/tags/{tag}");
        let output = run_git(
            &["log", "-1", "--format=%cI", &reference],
            Some(&self.local_path),
            cancel,
        )
        .await?;
        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| VcsError::BadTagDate {
                raw,
                message: e.to_string(),
            })
    }

    fn version_browse_url(&self, version: &VersionNumber) -> Option<String> {
        let tag = self.display_tag(version);
        self.link.as_ref()?.browse_url(&tag)
    }

    fn file_view_url(&self, version: &VersionNumber, path: &str) -> Option<String> {
        let tag = self.display_tag(version);
        self.link.as_ref()?.file_url(&tag, path)
    }
}

impl GitRepository {
    fn display_tag(&self, version: &VersionNumber) -> String {
        self.resolved_tags
            .lock()
            .unwrap()
            .get(&version.to_string())
            .cloned()
            .unwrap_or_else(|| format!("v{version}"))
    }
}

async fn run_git(
    args: &[&str],
    cwd: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<Output> {
    let mut command = tokio::process::Command::new("git");
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    command.kill_on_drop(true);

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(VcsError::Cancelled),
        output = command.output() => output?,
    };

    if !output.status.success() {
        return Err(VcsError::GitFailed {
            command: format!("git {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn stderr_means_missing_repo(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("repository not found")
        || lower.contains("does not exist")
        || lower.contains("could not read from remote repository")
}

fn dir_name_for(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dir_names_are_fs_safe() {
        assert_eq!(
            dir_name_for("https://github.com/acme/foo.git"),
            "https---github.com-acme-foo.git"
        );
    }

    #[test]
    fn missing_repo_detection() {
        assert!(stderr_means_missing_repo(
            "remote: Repository not found.\nfatal: ..."
        ));
        assert!(stderr_means_missing_repo(
            "fatal: could not read from remote repository"
        ));
        assert!(!stderr_means_missing_repo("fatal: bad object"));
    }

    #[test]
    fn clones_are_blobless_with_all_tags() {
        let args = GitRepository::clone_args("https://github.com/acme/foo", "/tmp/foo");
        assert!(args.contains(&"--filter=blob:none".to_string()));
        assert!(args.contains(&"--no-checkout".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--single-branch")));
    }

    #[test]
    fn tag_candidates_cover_v_prefix() {
        let version = VersionNumber::parse("1.2.3").unwrap();
        let [plain, prefixed] = GitRepository::tag_candidates(&version);
        assert_eq!(plain, "1.2.3");
        assert_eq!(prefixed, "v1.2.3");
    }
}
