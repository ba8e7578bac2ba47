//! Loading of a single documentation source file into a [`DocItem`].

use std::path::Path;

use regindex_types::{validate_doc_name, DocItem, DocItemDetails, VersionNumber};
use regindex_vcs::VcsRepository;

use crate::error::Result;
use crate::frontmatter;
use crate::layout::DocSource;

/// Files above this size are replaced with a pointer to the repository.
pub const MAX_DOC_BYTES: u64 = 10 * 1024 * 1024;

/// Body substituted for every document of a version whose license does not
/// permit redistribution.
pub const INCOMPATIBLE_LICENSE_TEXT: &str = "This document is not available because \
the source repository is published under a license that does not permit \
redistribution. Please refer to the source repository instead.\n";

fn file_too_large_text(view_url: Option<&str>) -> String {
    match view_url {
        Some(url) => format!(
            "This file is too large to be rendered here. You can view it in the \
source repository: {}\n",
            url
        ),
        None => "This file is too large to be rendered here. You can view it in \
the source repository.\n"
            .to_string(),
    }
}

/// Reads one discovered source file, extracting frontmatter metadata and
/// synthesizing the edit link. Returns `None` for names that do not survive
/// validation.
///
/// `redistributable` substitutes the license placeholder for the body while
/// keeping the extracted metadata, so the document tree stays navigable.
pub async fn load(
    source: &DocSource,
    repo: &dyn VcsRepository,
    version: &VersionNumber,
    redistributable: bool,
) -> Result<Option<DocItem>> {
    if let Err(err) = validate_doc_name(&source.name) {
        log::warn!("skipping documentation file {}: {}", source.repo_path, err);
        return Ok(None);
    }
    let edit_link = repo
        .file_view_url(version, &source.repo_path)
        .unwrap_or_default();

    let (meta, body) = read_body(&source.path, &edit_link).await?;
    let contents = if redistributable {
        body
    } else {
        INCOMPATIBLE_LICENSE_TEXT.to_string()
    };

    Ok(Some(DocItem {
        category: source.category,
        language: source.language,
        details: DocItemDetails {
            name: source.name.clone(),
            edit_link,
            title: meta.page_title.unwrap_or_default(),
            subcategory: meta.subcategory.unwrap_or_default(),
            description: meta.description.unwrap_or_default(),
        },
        contents,
    }))
}

pub(crate) async fn read_body(
    path: &Path,
    view_url: &str,
) -> Result<(frontmatter::Frontmatter, String)> {
    let len = tokio::fs::metadata(path).await?.len();
    if len > MAX_DOC_BYTES {
        let url = Some(view_url).filter(|u| !u.is_empty());
        return Ok((frontmatter::Frontmatter::default(), file_too_large_text(url)));
    }
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let meta = frontmatter::parse(&text);
    Ok((meta, text))
}
