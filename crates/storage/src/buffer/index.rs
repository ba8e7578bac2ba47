use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One staged file. `is_dirty` means the local copy has not been propagated
/// to the backing store yet; a clean entry is a read-through cache hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    #[serde(default)]
    pub is_dirty: bool,
}

/// One staged directory.
///
/// `is_wiped` records a pending `remove_all` against the backing store.
/// Wiping discards locally known descendants immediately; the backing store
/// is only touched at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    #[serde(default)]
    pub is_wiped: bool,
    #[serde(default)]
    pub subdirectories: BTreeMap<String, DirectoryNode>,
    #[serde(default)]
    pub files: BTreeMap<String, FileNode>,
}

impl DirectoryNode {
    /// Walks to a descendant directory, creating intermediate nodes.
    pub fn dir_mut(&mut self, segments: &[String]) -> &mut DirectoryNode {
        let mut node = self;
        for segment in segments {
            node = node.subdirectories.entry(segment.clone()).or_default();
        }
        node
    }

    /// Walks to a descendant directory without creating anything.
    pub fn dir(&self, segments: &[String]) -> Option<&DirectoryNode> {
        let mut node = self;
        for segment in segments {
            node = node.subdirectories.get(segment)?;
        }
        Some(node)
    }

    /// True if this node or any node along `segments` is wiped.
    pub fn wiped_along(&self, segments: &[String]) -> bool {
        let mut node = self;
        if node.is_wiped {
            return true;
        }
        for segment in segments {
            match node.subdirectories.get(segment) {
                Some(child) => {
                    if child.is_wiped {
                        return true;
                    }
                    node = child;
                }
                None => return false,
            }
        }
        false
    }

    /// Marks this directory wiped, forgetting every known descendant.
    pub fn wipe(&mut self) {
        self.is_wiped = true;
        self.subdirectories.clear();
        self.files.clear();
    }

    pub fn is_fully_clean(&self) -> bool {
        !self.is_wiped
            && self.files.values().all(|f| !f.is_dirty)
            && self.subdirectories.values().all(|d| d.is_fully_clean())
    }
}

/// The persisted journal: `.index.json` in the staging directory.
///
/// `commit_started` is the single bit that survives a crash and decides
/// between resuming a commit and discarding the staging directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferIndex {
    #[serde(default)]
    pub commit_started: bool,
    #[serde(default)]
    pub root: DirectoryNode,
}
