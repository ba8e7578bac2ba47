//! Provider documentation scraping for one checked-out version.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use regindex_storage::BufferedStorage;
use regindex_types::{
    CdktfLanguage, DocItem, Docs, LicenseList, ProviderVersionDoc, StoragePath, VersionNumber,
};
use regindex_vcs::VcsRepository;

use crate::doc;
use crate::error::Result;
use crate::layout;

/// Everything needed to scrape one provider version.
pub struct ProviderScrape<'a> {
    pub version: &'a VersionNumber,
    pub published: DateTime<Utc>,
    /// Checked-out source tree of the version's tag.
    pub worktree: &'a Path,
    pub repo: &'a dyn VcsRepository,
    pub licenses: LicenseList,
    /// Storage rooted at the version prefix,
    /// `providers/<namespace>/<name>/<version>`.
    pub storage: &'a BufferedStorage,
}

/// Walks the documentation tree of a provider worktree, writes every page
/// to storage and returns the version document destined for `index.json`.
///
/// Versions without redistributable licenses still produce the full tree,
/// with each body replaced by the license placeholder.
pub async fn scrape_provider_version(scrape: ProviderScrape<'_>) -> Result<ProviderVersionDoc> {
    let redistributable = scrape.licenses.is_redistributable();
    let tree = layout::discover(scrape.worktree);

    let mut docs = Docs::default();
    let mut cdktf_docs: BTreeMap<CdktfLanguage, Docs> = BTreeMap::new();
    for source in &tree.sources {
        let Some(item) = doc::load(source, scrape.repo, scrape.version, redistributable).await?
        else {
            continue;
        };
        scrape.storage.write(&item_path(&item)?, item.contents.as_bytes()).await?;

        let bucket = match item.language {
            Some(language) => cdktf_docs.entry(language).or_default(),
            None => &mut docs,
        };
        match item.category {
            Some(category) => bucket.insert(category, item.details),
            None => bucket.index = Some(item.details),
        }
    }
    docs.sort();
    for bucket in cdktf_docs.values_mut() {
        bucket.sort();
    }

    Ok(ProviderVersionDoc {
        id: scrape.version.clone(),
        published: scrape.published,
        docs,
        cdktf_docs,
        licenses: scrape.licenses,
        incompatible_license: !redistributable,
        link: scrape
            .repo
            .version_browse_url(scrape.version)
            .unwrap_or_default(),
    })
}

/// Object key of a documentation item relative to the version prefix:
/// `[cdktf/<language>/][<category>/]<name>.md`.
fn item_path(item: &DocItem) -> Result<StoragePath> {
    let mut key = String::new();
    if let Some(language) = item.language {
        key.push_str("cdktf/");
        key.push_str(language.as_str());
        key.push('/');
    }
    if let Some(category) = item.category {
        key.push_str(category.storage_dir());
        key.push('/');
    }
    key.push_str(&item.details.name);
    key.push_str(".md");
    Ok(StoragePath::new(key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regindex_types::DocCategory;

    fn item(
        name: &str,
        category: Option<DocCategory>,
        language: Option<CdktfLanguage>,
    ) -> DocItem {
        DocItem {
            category,
            language,
            details: regindex_types::DocItemDetails {
                name: name.into(),
                ..Default::default()
            },
            contents: String::new(),
        }
    }

    #[test]
    fn item_paths_follow_the_version_layout() {
        let root = item("index", None, None);
        assert_eq!(item_path(&root).unwrap().as_str(), "index.md");

        let resource = item("widget", Some(DocCategory::Resources), None);
        assert_eq!(item_path(&resource).unwrap().as_str(), "resources/widget.md");

        let cdktf = item(
            "widget",
            Some(DocCategory::Datasources),
            Some(CdktfLanguage::Python),
        );
        assert_eq!(
            item_path(&cdktf).unwrap().as_str(),
            "cdktf/python/datasources/widget.md"
        );
    }
}
