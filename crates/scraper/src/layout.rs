//! Discovery of documentation trees inside a checked-out repository.
//!
//! Providers keep their docs under `website/docs/` or `docs/`; the first
//! root found wins and the other is ignored. Inside a root, category
//! directories map onto [`DocCategory`] and files with a recognized
//! markdown extension become documentation items.

use std::path::{Path, PathBuf};

use regindex_types::{normalize_doc_name, CdktfLanguage, DocCategory, CDKTF_LANGUAGES};
use walkdir::WalkDir;

/// Candidate documentation roots relative to the repository, in priority
/// order.
const DOC_ROOTS: &[&str] = &["website/docs", "docs"];

/// Recognized markdown extensions, longest first so compound extensions
/// are stripped whole.
const DOC_EXTENSIONS: &[&str] = &[
    ".html.markdown",
    ".markdown.html",
    ".html.md",
    ".md.html",
    ".markdown",
    ".md",
];

const CDKTF_DIR: &str = "cdktf";

/// A single documentation source file discovered inside a doc root.
#[derive(Debug, Clone, PartialEq)]
pub struct DocSource {
    /// Normalized item name with the markdown extension stripped.
    pub name: String,
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// Path relative to the repository root, for edit link synthesis.
    pub repo_path: String,
    pub category: Option<DocCategory>,
    pub language: Option<CdktfLanguage>,
}

/// The documentation tree of one checked-out version.
#[derive(Debug, Default)]
pub struct DocTree {
    pub sources: Vec<DocSource>,
}

/// Locates the documentation root of `worktree` and collects every doc
/// source beneath it, including CDKTF language subtrees. Returns an empty
/// tree when the repository ships no documentation.
pub fn discover(worktree: &Path) -> DocTree {
    let mut tree = DocTree::default();
    let Some(root_rel) = DOC_ROOTS
        .iter()
        .find(|root| worktree.join(root).is_dir())
    else {
        return tree;
    };
    let root = worktree.join(root_rel);
    collect_root(&root, root_rel, None, &mut tree);

    let cdktf_root = root.join(CDKTF_DIR);
    if cdktf_root.is_dir() {
        for language in CDKTF_LANGUAGES {
            let lang_root = cdktf_root.join(language.as_str());
            if !lang_root.is_dir() {
                continue;
            }
            let lang_rel = format!("{}/{}/{}", root_rel, CDKTF_DIR, language.as_str());
            collect_root(&lang_root, &lang_rel, Some(language), &mut tree);
        }
    }
    tree
}

/// Collects the root-level index document and every category directory
/// directly under `root`.
fn collect_root(root: &Path, root_rel: &str, language: Option<CdktfLanguage>, tree: &mut DocTree) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("failed to list documentation root {}: {}", root.display(), err);
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() {
            let Some(category) = DocCategory::from_source_dir(&file_name) else {
                continue;
            };
            let dir_rel = format!("{}/{}", root_rel, file_name);
            collect_category(&path, &dir_rel, category, language, tree);
        } else if let Some(name) = strip_doc_extension(&normalize_doc_name(&file_name)) {
            // Only the root index page is a documentation item at this
            // level; changelogs and the like are skipped.
            if name != "index" {
                continue;
            }
            tree.sources.push(DocSource {
                name,
                path,
                repo_path: format!("{}/{}", root_rel, file_name),
                category: None,
                language,
            });
        }
    }
}

fn collect_category(
    dir: &Path,
    dir_rel: &str,
    category: DocCategory,
    language: Option<CdktfLanguage>,
    tree: &mut DocTree,
) {
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(name) = strip_doc_extension(&normalize_doc_name(&file_name)) else {
            continue;
        };
        let rel = match entry.path().strip_prefix(dir) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        tree.sources.push(DocSource {
            name,
            path: entry.path().to_path_buf(),
            repo_path: format!("{}/{}", dir_rel, rel),
            category: Some(category),
            language,
        });
    }
}

/// Strips the first matching markdown extension from an already-normalized
/// name. Returns `None` when the name carries no recognized extension or
/// nothing remains after stripping.
pub fn strip_doc_extension(name: &str) -> Option<String> {
    for ext in DOC_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            if stem.is_empty() {
                return None;
            }
            return Some(stem.to_string());
        }
    }
    None
}
