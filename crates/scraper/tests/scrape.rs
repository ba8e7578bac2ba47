//! End-to-end scraping over mock repositories and local buffered storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regindex_scraper::{
    scrape_module_version, scrape_provider_version, ModuleScrape, ProviderScrape, SchemaExtractor,
    INCOMPATIBLE_LICENSE_TEXT,
};
use regindex_storage::{BufferedStorage, LocalBackend, Storage, StoragePath};
use regindex_types::{License, LicenseList, VersionNumber};
use regindex_vcs::mock::{MockRepoSpec, MockTag, MockVcsClient};
use regindex_vcs::{VcsClient, VcsRepository};
use tokio_util::sync::CancellationToken;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

struct Harness {
    _dir: tempfile::TempDir,
    storage: BufferedStorage,
    repo: Arc<dyn VcsRepository>,
    worktree: PathBuf,
    cancel: CancellationToken,
}

async fn harness(files: &[(&str, &str)]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let backing = Storage::new(Arc::new(LocalBackend::new(dir.path().join("backing"))));
    let storage = BufferedStorage::new(backing, dir.path().join("staging"), None)
        .await
        .unwrap();

    let client = MockVcsClient::new(dir.path().join("vcs"));
    let mut tag = MockTag::new();
    for (path, contents) in files {
        tag = tag.file(path, *contents);
    }
    client.add_repo(
        "https://github.com/acme/widgets",
        MockRepoSpec::default().tag("v1.0.0", tag),
    );

    let cancel = CancellationToken::new();
    let repo = client
        .open("https://github.com/acme/widgets", &cancel)
        .await
        .unwrap();
    let worktree = repo
        .add_worktree(&VersionNumber::parse("1.0.0").unwrap(), &cancel)
        .await
        .unwrap();
    Harness {
        _dir: dir,
        storage,
        repo,
        worktree,
        cancel,
    }
}

fn compatible_licenses() -> LicenseList {
    LicenseList(vec![License {
        spdx_id: "MPL-2.0".into(),
        confidence: 0.99,
        is_compatible: true,
        file: "LICENSE".into(),
        link: String::new(),
    }])
}

fn incompatible_licenses() -> LicenseList {
    LicenseList(vec![License {
        spdx_id: "GPL-3.0".into(),
        confidence: 0.99,
        is_compatible: false,
        file: "LICENSE".into(),
        link: String::new(),
    }])
}

async fn stored(storage: &BufferedStorage, key: &str) -> String {
    let bytes = storage.read(&StoragePath::new(key).unwrap()).await.unwrap();
    String::from_utf8(bytes).unwrap()
}

#[cfg(unix)]
fn fake_extractor(dir: &Path, stdout: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-metadata-tool");
    let script = format!("#!/bin/sh\ncat <<'JSON'\n{}\nJSON\n", stdout);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn provider_scrape_writes_pages_and_builds_the_version_doc() {
    let h = harness(&[
        (
            "website/docs/index.md",
            "---\npage_title: Widgets Provider\n---\n# Widgets\n",
        ),
        (
            "website/docs/r/Widget Frame.html.md",
            "---\npage_title: widgets_frame\nsubcategory: Frames\n---\nbody\n",
        ),
        ("website/docs/d/lookup.md", "datasource body\n"),
        ("website/docs/cdktf/python/r/Widget Frame.html.md", "py body\n"),
    ])
    .await;

    let version = VersionNumber::parse("1.0.0").unwrap();
    let doc = scrape_provider_version(ProviderScrape {
        version: &version,
        published: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        worktree: &h.worktree,
        repo: h.repo.as_ref(),
        licenses: compatible_licenses(),
        storage: &h.storage,
    })
    .await
    .unwrap();

    assert!(!doc.incompatible_license);
    assert_eq!(
        doc.link,
        "https://github.com/acme/widgets/tree/v1.0.0"
    );
    assert_eq!(doc.docs.index.as_ref().unwrap().title, "Widgets Provider");

    assert_eq!(doc.docs.resources.len(), 1);
    let frame = &doc.docs.resources[0];
    assert_eq!(frame.name, "widgetframe");
    assert_eq!(frame.subcategory, "Frames");
    assert_eq!(
        frame.edit_link,
        "https://github.com/acme/widgets/blob/v1.0.0/website/docs/r/Widget Frame.html.md"
    );
    assert_eq!(doc.docs.datasources.len(), 1);

    let python = doc
        .cdktf_docs
        .get(&regindex_types::CdktfLanguage::Python)
        .unwrap();
    assert_eq!(python.resources.len(), 1);

    assert_eq!(
        stored(&h.storage, "resources/widgetframe.md").await,
        "---\npage_title: widgets_frame\nsubcategory: Frames\n---\nbody\n"
    );
    assert_eq!(
        stored(&h.storage, "cdktf/python/resources/widgetframe.md").await,
        "py body\n"
    );
}

#[tokio::test]
async fn incompatible_license_replaces_bodies_but_keeps_the_tree() {
    let h = harness(&[(
        "docs/resources/widget.md",
        "---\npage_title: widget\n---\nsecret body\n",
    )])
    .await;

    let version = VersionNumber::parse("1.0.0").unwrap();
    let doc = scrape_provider_version(ProviderScrape {
        version: &version,
        published: Utc::now(),
        worktree: &h.worktree,
        repo: h.repo.as_ref(),
        licenses: incompatible_licenses(),
        storage: &h.storage,
    })
    .await
    .unwrap();

    assert!(doc.incompatible_license);
    assert_eq!(doc.docs.resources.len(), 1);
    assert_eq!(doc.docs.resources[0].title, "widget");
    assert_eq!(
        stored(&h.storage, "resources/widget.md").await,
        INCOMPATIBLE_LICENSE_TEXT
    );
}

#[cfg(unix)]
#[tokio::test]
async fn module_scrape_collects_readmes_submodules_and_schema() {
    let h = harness(&[
        ("README.md", "# Root module\n"),
        ("modules/vpc/README.md", "# VPC submodule\n"),
        ("examples/basic/README.md", "# Basic example\n"),
        ("examples/basic/main.tf", ""),
    ])
    .await;

    let schema_json = r#"{"variables":{"region":{"type":"string","required":true}},"outputs":{"arn":{"description":"ARN"}}}"#;
    let binary = fake_extractor(h._dir.path(), schema_json);
    let extractor = SchemaExtractor::new(binary);

    let version = VersionNumber::parse("1.0.0").unwrap();
    let doc = scrape_module_version(ModuleScrape {
        version: &version,
        published: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        worktree: &h.worktree,
        repo: h.repo.as_ref(),
        licenses: compatible_licenses(),
        storage: &h.storage,
        extractor: &extractor,
        cancel: &h.cancel,
    })
    .await
    .unwrap();

    assert!(doc.details.readme);
    assert!(doc.details.variables.contains_key("region"));
    assert!(doc.details.outputs.contains_key("arn"));
    assert!(doc.details.schema_error.is_empty());

    assert_eq!(doc.submodules.len(), 1);
    assert!(doc.submodules["vpc"].readme);
    assert_eq!(doc.examples.len(), 1);
    assert!(doc.examples["basic"].readme);

    assert_eq!(stored(&h.storage, "README.md").await, "# Root module\n");
    assert_eq!(
        stored(&h.storage, "modules/vpc/README.md").await,
        "# VPC submodule\n"
    );
    assert_eq!(
        stored(&h.storage, "examples/basic/README.md").await,
        "# Basic example\n"
    );
}

#[tokio::test]
async fn failed_schema_extraction_is_recorded_not_fatal() {
    let h = harness(&[("README.md", "# Root module\n")]).await;
    let extractor = SchemaExtractor::new("/nonexistent/metadata-tool");

    let version = VersionNumber::parse("1.0.0").unwrap();
    let doc = scrape_module_version(ModuleScrape {
        version: &version,
        published: Utc::now(),
        worktree: &h.worktree,
        repo: h.repo.as_ref(),
        licenses: compatible_licenses(),
        storage: &h.storage,
        extractor: &extractor,
        cancel: &h.cancel,
    })
    .await
    .unwrap();

    assert!(doc.details.readme);
    assert!(!doc.details.schema_error.is_empty());
}

#[tokio::test]
async fn incompatible_module_license_suppresses_schema_extraction() {
    let h = harness(&[("README.md", "# Root module\n")]).await;
    // Would fail loudly if invoked.
    let extractor = SchemaExtractor::new("/nonexistent/metadata-tool");

    let version = VersionNumber::parse("1.0.0").unwrap();
    let doc = scrape_module_version(ModuleScrape {
        version: &version,
        published: Utc::now(),
        worktree: &h.worktree,
        repo: h.repo.as_ref(),
        licenses: incompatible_licenses(),
        storage: &h.storage,
        extractor: &extractor,
        cancel: &h.cancel,
    })
    .await
    .unwrap();

    assert!(doc.incompatible_license);
    assert!(doc.details.schema_error.is_empty());
    assert_eq!(stored(&h.storage, "README.md").await, INCOMPATIBLE_LICENSE_TEXT);
}
