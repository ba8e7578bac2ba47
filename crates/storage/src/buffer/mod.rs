mod index;

pub use index::{BufferIndex, DirectoryNode, FileNode};

use crate::error::{Result, StorageError};
use crate::Storage;
use regindex_types::StoragePath;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const INDEX_FILE_NAME: &str = ".index.json";

const SAVE_INTERVAL: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_UPLOAD_PARALLELISM: usize = 25;

struct BufferState {
    index: BufferIndex,
    last_saved: Instant,
}

struct BufferShared {
    backing: Storage,
    staging_dir: PathBuf,
    upload_parallelism: usize,
    state: Mutex<BufferState>,
}

/// Transactional write buffer over a backing [`Storage`].
///
/// All writes and removals land in a local staging directory and a journaled
/// index; the backing store only changes inside `commit`. Handles are cheap
/// to clone and may be re-rooted with [`BufferedStorage::subdirectory`];
/// every handle shares one buffer, so `commit`/`rollback`/`recover` always
/// apply to the whole staged state.
#[derive(Clone)]
pub struct BufferedStorage {
    shared: Arc<BufferShared>,
    prefix: Option<StoragePath>,
}

impl BufferedStorage {
    pub async fn new(
        backing: Storage,
        staging_dir: impl Into<PathBuf>,
        upload_parallelism: Option<usize>,
    ) -> Result<Self> {
        let staging_dir = staging_dir.into();
        tokio::fs::create_dir_all(&staging_dir).await?;

        let index_path = staging_dir.join(INDEX_FILE_NAME);
        let index = match tokio::fs::read(&index_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BufferIndex::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            shared: Arc::new(BufferShared {
                backing,
                staging_dir,
                upload_parallelism: upload_parallelism.unwrap_or(DEFAULT_UPLOAD_PARALLELISM),
                state: Mutex::new(BufferState {
                    index,
                    last_saved: Instant::now(),
                }),
            }),
            prefix: None,
        })
    }

    pub fn subdirectory(&self, prefix: &str) -> Result<Self> {
        let prefix = match &self.prefix {
            Some(existing) => existing.join(prefix)?,
            None => StoragePath::new(prefix)?,
        };
        Ok(Self {
            shared: Arc::clone(&self.shared),
            prefix: Some(prefix),
        })
    }

    fn resolve(&self, path: &StoragePath) -> Result<StoragePath> {
        match &self.prefix {
            Some(prefix) => Ok(prefix.join(path.as_str())?),
            None => Ok(path.clone()),
        }
    }

    fn split(path: &StoragePath) -> (Vec<String>, String) {
        let mut segments: Vec<String> = path.segments().map(str::to_string).collect();
        let file = segments.pop().unwrap_or_default();
        (segments, file)
    }

    fn staging_file(&self, dirs: &[String], file: &str) -> PathBuf {
        let mut out = self.shared.staging_dir.clone();
        for segment in dirs {
            out.push(segment);
        }
        out.push(file);
        out
    }

    pub async fn read(&self, path: &StoragePath) -> Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        let (dirs, file) = Self::split(&resolved);
        let mut state = self.shared.state.lock().await;

        let staged = state
            .index
            .root
            .dir(&dirs)
            .map(|d| d.files.contains_key(&file))
            .unwrap_or(false);
        if staged {
            return Ok(tokio::fs::read(self.staging_file(&dirs, &file)).await?);
        }

        if state.index.root.wiped_along(&dirs) {
            return Err(StorageError::NotFound(resolved));
        }

        let bytes = self.shared.backing.read(&resolved).await?;

        // Cache the fetch so repeated reads stay local.
        let local = self.staging_file(&dirs, &file);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local, &bytes).await?;
        state
            .index
            .root
            .dir_mut(&dirs)
            .files
            .insert(file, FileNode { is_dirty: false });

        Ok(bytes)
    }

    pub async fn write(&self, path: &StoragePath, bytes: &[u8]) -> Result<()> {
        let resolved = self.resolve(path)?;
        let (dirs, file) = Self::split(&resolved);
        let mut state = self.shared.state.lock().await;

        let local = self.staging_file(&dirs, &file);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local, bytes).await?;

        state
            .index
            .root
            .dir_mut(&dirs)
            .files
            .insert(file, FileNode { is_dirty: true });

        self.maybe_save(&mut state).await
    }

    pub async fn remove_all(&self, prefix: &StoragePath) -> Result<()> {
        let resolved = self.resolve(prefix)?;
        let segments: Vec<String> = resolved.segments().map(str::to_string).collect();
        let mut state = self.shared.state.lock().await;

        let mut local = self.shared.staging_dir.clone();
        for segment in &segments {
            local.push(segment);
        }
        match tokio::fs::remove_dir_all(&local).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if e.kind() == ErrorKind::NotADirectory => {
                tokio::fs::remove_file(&local).await?;
            }
            Err(e) => return Err(e.into()),
        }

        state.index.root.dir_mut(&segments).wipe();
        // Wipe marks must survive a crash even under the save interval.
        self.save_index(&mut state).await
    }

    /// Publishes all staged state to the backing store.
    ///
    /// Resumable: per-item flags are cleared only on individual success, so a
    /// crashed or failed commit re-run does strictly less work.
    pub async fn commit(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        state.index.commit_started = true;
        self.save_index(&mut state).await?;
        self.commit_locked(&mut state, cancel).await?;
        self.clear_local(&mut state).await
    }

    /// Discards all staged state.
    pub async fn rollback(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.clear_local(&mut state).await
    }

    /// Startup reconciliation: resume a journaled commit, otherwise discard
    /// whatever staging survived the previous run.
    pub async fn recover(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if state.index.commit_started {
            log::info!("storage: resuming interrupted commit");
            self.commit_locked(&mut state, cancel).await?;
            self.clear_local(&mut state).await
        } else if state.index.root != DirectoryNode::default() {
            log::info!("storage: discarding stale staging directory");
            self.clear_local(&mut state).await
        } else {
            Ok(())
        }
    }

    async fn commit_locked(
        &self,
        state: &mut BufferState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Pre-order walk; a directory's wipe must hit the backing store
        // before any upload under it, or a later wipe could erase files a
        // parallel upload already published.
        let mut stack: Vec<Vec<String>> = vec![Vec::new()];
        while let Some(dir_segs) = stack.pop() {
            if cancel.is_cancelled() {
                self.save_index(state).await?;
                return Err(StorageError::Cancelled);
            }

            let Some(node) = state.index.root.dir(&dir_segs) else {
                continue;
            };
            let is_wiped = node.is_wiped;
            let dirty: Vec<String> = node
                .files
                .iter()
                .filter(|(_, f)| f.is_dirty)
                .map(|(name, _)| name.clone())
                .collect();
            let subdirs: Vec<String> = node.subdirectories.keys().cloned().collect();

            if is_wiped && !dir_segs.is_empty() {
                let dir_path = StoragePath::new(dir_segs.join("/"))?;
                self.shared.backing.remove_all(&dir_path).await?;
                state.index.root.dir_mut(&dir_segs).is_wiped = false;
                self.save_index(state).await?;
            }

            if !dirty.is_empty() {
                self.upload_dir(state, cancel, &dir_segs, dirty).await?;
            }

            for name in subdirs {
                let mut child = dir_segs.clone();
                child.push(name);
                stack.push(child);
            }
        }
        Ok(())
    }

    async fn upload_dir(
        &self,
        state: &mut BufferState,
        cancel: &CancellationToken,
        dir_segs: &[String],
        dirty: Vec<String>,
    ) -> Result<()> {
        let commit_cancel = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.shared.upload_parallelism));
        let mut tasks: JoinSet<(String, Result<()>)> = JoinSet::new();

        for name in dirty {
            let backing = self.shared.backing.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = commit_cancel.clone();
            let local = self.staging_file(dir_segs, &name);
            let object_path = if dir_segs.is_empty() {
                StoragePath::new(name.clone())?
            } else {
                StoragePath::new(format!("{}/{}", dir_segs.join("/"), name))?
            };

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (name, Err(StorageError::Cancelled)),
                };
                if token.is_cancelled() {
                    return (name, Err(StorageError::Cancelled));
                }
                let bytes = match tokio::fs::read(&local).await {
                    Ok(bytes) => bytes,
                    Err(e) => return (name, Err(e.into())),
                };
                let result = tokio::select! {
                    _ = token.cancelled() => Err(StorageError::Cancelled),
                    r = backing.write(&object_path, &bytes) => r,
                };
                (name, result)
            });
        }

        let mut first_err: Option<StorageError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    if let Some(file) = state.index.root.dir_mut(dir_segs).files.get_mut(&name) {
                        file.is_dirty = false;
                    }
                }
                Ok((name, Err(e))) => {
                    if first_err.is_none() {
                        log::warn!("storage: upload of {name} failed: {e}");
                        first_err = Some(e);
                        commit_cancel.cancel();
                    }
                }
                Err(join_err) => {
                    if first_err.is_none() {
                        first_err = Some(StorageError::CommitAborted(join_err.to_string()));
                        commit_cancel.cancel();
                    }
                }
            }
        }

        self.save_index(state).await?;
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn clear_local(&self, state: &mut BufferState) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.shared.staging_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.shared.staging_dir).await?;
        state.index = BufferIndex::default();
        state.last_saved = Instant::now();
        Ok(())
    }

    async fn maybe_save(&self, state: &mut BufferState) -> Result<()> {
        if state.last_saved.elapsed() >= SAVE_INTERVAL {
            self.save_index(state).await?;
        }
        Ok(())
    }

    async fn save_index(&self, state: &mut BufferState) -> Result<()> {
        let bytes = serde_json::to_vec(&state.index)?;
        let path = self.shared.staging_dir.join(INDEX_FILE_NAME);
        let tmp = self.shared.staging_dir.join(".index.json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        state.last_saved = Instant::now();
        Ok(())
    }
}
