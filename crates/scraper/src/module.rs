//! Module documentation and schema scraping for one checked-out version.
//!
//! A module version consists of the root directory plus one level of
//! `modules/<name>` submodules and `examples/<name>` examples. Each
//! directory contributes its README and, when the license permits, the
//! variables and outputs reported by the schema extractor.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use regindex_storage::BufferedStorage;
use regindex_types::{
    validate_doc_name, LicenseList, ModuleDetails, ModuleVersionDoc, StoragePath, VersionNumber,
};
use regindex_vcs::VcsRepository;
use tokio_util::sync::CancellationToken;

use crate::doc::{self, INCOMPATIBLE_LICENSE_TEXT};
use crate::error::{Result, SchemaError, ScraperError};
use crate::layout::strip_doc_extension;
use crate::schema::SchemaExtractor;

const SUBMODULE_DIR: &str = "modules";
const EXAMPLE_DIR: &str = "examples";

/// Everything needed to scrape one module version.
pub struct ModuleScrape<'a> {
    pub version: &'a VersionNumber,
    pub published: DateTime<Utc>,
    pub worktree: &'a Path,
    pub repo: &'a dyn VcsRepository,
    pub licenses: LicenseList,
    /// Storage rooted at the version prefix,
    /// `modules/<namespace>/<name>/<target>/<version>`.
    pub storage: &'a BufferedStorage,
    pub extractor: &'a SchemaExtractor,
    pub cancel: &'a CancellationToken,
}

/// Scrapes the root, submodules and examples of a module worktree, writes
/// every README to storage and returns the version document.
pub async fn scrape_module_version(scrape: ModuleScrape<'_>) -> Result<ModuleVersionDoc> {
    let redistributable = scrape.licenses.is_redistributable();

    let details = scrape_dir(&scrape, scrape.worktree, "", redistributable).await?;
    let submodules = scrape_children(&scrape, SUBMODULE_DIR, redistributable).await?;
    let examples = scrape_children(&scrape, EXAMPLE_DIR, redistributable).await?;

    Ok(ModuleVersionDoc {
        id: scrape.version.clone(),
        published: scrape.published,
        details,
        submodules,
        examples,
        licenses: scrape.licenses.clone(),
        incompatible_license: !redistributable,
        link: scrape
            .repo
            .version_browse_url(scrape.version)
            .unwrap_or_default(),
    })
}

/// Walks one level of `modules/` or `examples/` child directories.
async fn scrape_children(
    scrape: &ModuleScrape<'_>,
    parent: &str,
    redistributable: bool,
) -> Result<BTreeMap<String, ModuleDetails>> {
    let mut children = BTreeMap::new();
    let parent_dir = scrape.worktree.join(parent);
    if !parent_dir.is_dir() {
        return Ok(children);
    }
    let mut entries = tokio::fs::read_dir(&parent_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if validate_doc_name(&name).is_err() {
            log::warn!("skipping {} directory with unusable name: {:?}", parent, name);
            continue;
        }
        let rel = format!("{}/{}", parent, name);
        let details = scrape_dir(scrape, &entry.path(), &rel, redistributable).await?;
        children.insert(name, details);
    }
    Ok(children)
}

/// Scrapes one module directory: README discovery and upload, then schema
/// extraction. `rel` is the directory path relative to the repository root,
/// empty for the root itself.
async fn scrape_dir(
    scrape: &ModuleScrape<'_>,
    dir: &Path,
    rel: &str,
    redistributable: bool,
) -> Result<ModuleDetails> {
    let mut details = ModuleDetails::default();

    if let Some(readme) = find_readme(dir).await? {
        let repo_path = if rel.is_empty() {
            readme.clone()
        } else {
            format!("{}/{}", rel, readme)
        };
        let edit_link = scrape
            .repo
            .file_view_url(scrape.version, &repo_path)
            .unwrap_or_default();
        let (_, body) = doc::read_body(&dir.join(&readme), &edit_link).await?;
        let contents = if redistributable {
            body
        } else {
            INCOMPATIBLE_LICENSE_TEXT.to_string()
        };
        scrape
            .storage
            .write(&readme_path(rel)?, contents.as_bytes())
            .await?;
        details.readme = true;
        details.edit_link = edit_link;
    }

    if redistributable {
        match scrape.extractor.extract(dir, scrape.cancel).await {
            Ok(schema) => details.merge_schema(schema.variables, schema.outputs),
            Err(SchemaError::Cancelled) => return Err(ScraperError::Cancelled),
            Err(err) => {
                log::warn!("schema extraction failed in {}: {}", dir.display(), err);
                details.schema_error = err.to_string();
            }
        }
    }
    Ok(details)
}

/// Finds the directory's README regardless of casing or markdown extension
/// variant. Returns the on-disk file name.
async fn find_readme(dir: &Path) -> Result<Option<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let normalized = regindex_types::normalize_doc_name(&name);
        if strip_doc_extension(&normalized).as_deref() == Some("readme") {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

fn readme_path(rel: &str) -> Result<StoragePath> {
    let key = if rel.is_empty() {
        "README.md".to_string()
    } else {
        format!("{}/README.md", rel)
    };
    Ok(StoragePath::new(key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn readme_discovery_handles_extension_variants() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Readme.markdown"), "m").unwrap();
        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        let found = find_readme(dir.path()).await.unwrap();
        assert_eq!(found.as_deref(), Some("Readme.markdown"));
    }

    #[tokio::test]
    async fn missing_readme_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "").unwrap();
        assert_eq!(find_readme(dir.path()).await.unwrap(), None);
    }

    #[test]
    fn readme_paths_are_rooted_per_directory() {
        assert_eq!(readme_path("").unwrap().as_str(), "README.md");
        assert_eq!(
            readme_path("modules/vpc").unwrap().as_str(),
            "modules/vpc/README.md"
        );
    }
}
