use crate::error::{RegistryError, Result};
use crate::filter::Filter;
use regindex_types::{ModuleAddr, ProviderAddr, VersionNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// On-disk shape of one registry metadata file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryEntryFile {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub fork_of: String,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub blocked_reason: String,
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderEntry {
    pub addr: ProviderAddr,
    pub metadata: RegistryEntryFile,
    /// Parsed versions, sorted descending. Unparsable version strings are
    /// dropped with a warning.
    pub versions: Vec<VersionNumber>,
}

#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub addr: ModuleAddr,
    pub metadata: RegistryEntryFile,
    pub versions: Vec<VersionNumber>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AliasFile {
    #[serde(default)]
    providers: HashMap<String, String>,
}

/// Enumerates providers and modules from a cloned registry tree.
#[derive(Debug)]
pub struct RegistrySource {
    root: PathBuf,
    provider_aliases: HashMap<ProviderAddr, ProviderAddr>,
}

impl RegistrySource {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(RegistryError::MissingRoot(root.display().to_string()));
        }

        let mut provider_aliases = HashMap::new();
        let alias_path = root.join("aliases.json");
        if alias_path.is_file() {
            let bytes = tokio::fs::read(&alias_path).await?;
            let parsed: AliasFile =
                serde_json::from_slice(&bytes).map_err(|e| RegistryError::MalformedFile {
                    file: alias_path.display().to_string(),
                    source: e,
                })?;
            for (alias, canonical) in parsed.providers {
                let alias = ProviderAddr::from_str(&alias)?;
                let canonical = ProviderAddr::from_str(&canonical)?;
                provider_aliases.insert(alias, canonical);
            }
        }

        Ok(Self {
            root,
            provider_aliases,
        })
    }

    /// The address of the repository actually hosting the code. Artifacts
    /// stay keyed by the requested address; only scraping follows the alias.
    pub fn canonical_provider_addr(&self, addr: &ProviderAddr) -> ProviderAddr {
        self.provider_aliases.get(addr).cloned().unwrap_or_else(|| addr.clone())
    }

    pub fn alias_target(&self, addr: &ProviderAddr) -> Option<&ProviderAddr> {
        self.provider_aliases.get(addr)
    }

    pub async fn list_providers(&self, filter: &Filter) -> Result<Vec<ProviderEntry>> {
        let root = self.root.join("providers");
        let filter = filter.clone();
        let files = tokio::task::spawn_blocking(move || collect_json_files(&root, 2))
            .await
            .map_err(|e| RegistryError::JoinError(e.to_string()))?;

        let mut entries = Vec::new();
        for file in files {
            let Some((namespace, name)) = addr_segments_2(&file) else {
                continue;
            };
            let addr = match ProviderAddr::new(&namespace, &name) {
                Ok(addr) => addr,
                Err(e) => {
                    log::warn!("registry: skipping {}: {e}", file.display());
                    continue;
                }
            };
            if !filter.matches(&format!("{}/{}", addr.namespace, addr.name)) {
                continue;
            }
            let metadata = read_entry_file(&file).await?;
            let versions = parse_versions(&metadata.versions, &addr.display);
            entries.push(ProviderEntry {
                addr,
                metadata,
                versions,
            });
        }
        entries.sort_by(|a, b| a.addr.cmp(&b.addr));
        Ok(entries)
    }

    pub async fn list_modules(&self, filter: &Filter) -> Result<Vec<ModuleEntry>> {
        let root = self.root.join("modules");
        let filter = filter.clone();
        let files = tokio::task::spawn_blocking(move || collect_json_files(&root, 3))
            .await
            .map_err(|e| RegistryError::JoinError(e.to_string()))?;

        let mut entries = Vec::new();
        for file in files {
            let Some((namespace, name, target)) = addr_segments_3(&file) else {
                continue;
            };
            let addr = match ModuleAddr::new(&namespace, &name, &target) {
                Ok(addr) => addr,
                Err(e) => {
                    log::warn!("registry: skipping {}: {e}", file.display());
                    continue;
                }
            };
            if !filter.matches(&format!(
                "{}/{}/{}",
                addr.namespace, addr.name, addr.target_system
            )) {
                continue;
            }
            let metadata = read_entry_file(&file).await?;
            let versions = parse_versions(&metadata.versions, &addr.display);
            entries.push(ModuleEntry {
                addr,
                metadata,
                versions,
            });
        }
        entries.sort_by(|a, b| a.addr.cmp(&b.addr));
        Ok(entries)
    }
}

fn collect_json_files(root: &Path, depth: usize) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .min_depth(depth)
        .max_depth(depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map(|e| e == "json").unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn addr_segments_2(file: &Path) -> Option<(String, String)> {
    let name = file.file_stem()?.to_str()?.to_string();
    let namespace = file.parent()?.file_name()?.to_str()?.to_string();
    Some((namespace, name))
}

fn addr_segments_3(file: &Path) -> Option<(String, String, String)> {
    let target = file.file_stem()?.to_str()?.to_string();
    let name = file.parent()?.file_name()?.to_str()?.to_string();
    let namespace = file.parent()?.parent()?.file_name()?.to_str()?.to_string();
    Some((namespace, name, target))
}

async fn read_entry_file(file: &Path) -> Result<RegistryEntryFile> {
    let bytes = tokio::fs::read(file).await?;
    serde_json::from_slice(&bytes).map_err(|e| RegistryError::MalformedFile {
        file: file.display().to_string(),
        source: e,
    })
}

fn parse_versions(raw: &[String], addr: &str) -> Vec<VersionNumber> {
    let mut versions: Vec<VersionNumber> = raw
        .iter()
        .filter_map(|v| match VersionNumber::parse(v) {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("registry: {addr}: dropping version {v:?}: {e}");
                None
            }
        })
        .collect();
    VersionNumber::sort_descending(&mut versions);
    versions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn write_json(path: &Path, value: serde_json::Value) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, serde_json::to_vec_pretty(&value).unwrap())
            .await
            .unwrap();
    }

    async fn fixture() -> (tempfile::TempDir, RegistrySource) {
        let dir = tempfile::tempdir().unwrap();
        write_json(
            &dir.path().join("providers/acme/foo.json"),
            serde_json::json!({
                "repository": "https://github.com/acme/provider-foo",
                "description": "Foo things",
                "versions": ["v1.0.0", "1.2.0", "not-semver"]
            }),
        )
        .await;
        write_json(
            &dir.path().join("providers/zeta/bar.json"),
            serde_json::json!({"versions": ["0.1.0"], "blocked": true, "blocked_reason": "policy"}),
        )
        .await;
        write_json(
            &dir.path().join("modules/acme/compute/aws.json"),
            serde_json::json!({"versions": ["2.0.0"]}),
        )
        .await;
        write_json(
            &dir.path().join("aliases.json"),
            serde_json::json!({"providers": {"mirror/foo": "acme/foo"}}),
        )
        .await;
        let source = RegistrySource::open(dir.path()).await.unwrap();
        (dir, source)
    }

    #[tokio::test]
    async fn lists_providers_sorted_with_versions_descending() {
        let (_dir, source) = fixture().await;
        let providers = source.list_providers(&Filter::default()).await.unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].addr.display, "acme/foo");
        let ids: Vec<String> = providers[0].versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(ids, vec!["1.2.0", "1.0.0"]);
        assert!(providers[1].metadata.blocked);
    }

    #[tokio::test]
    async fn namespace_filter_applies() {
        let (_dir, source) = fixture().await;
        let providers = source
            .list_providers(&Filter::parse("zeta"))
            .await
            .unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].addr.namespace, "zeta");
    }

    #[tokio::test]
    async fn lists_modules_at_three_levels() {
        let (_dir, source) = fixture().await;
        let modules = source.list_modules(&Filter::default()).await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].addr.display, "acme/compute/aws");
    }

    #[tokio::test]
    async fn alias_resolution_maps_to_canonical() {
        let (_dir, source) = fixture().await;
        let alias = ProviderAddr::new("mirror", "foo").unwrap();
        let canonical = source.canonical_provider_addr(&alias);
        assert_eq!(canonical.display, "acme/foo");
        // Non-aliased addresses map to themselves.
        let plain = ProviderAddr::new("acme", "foo").unwrap();
        assert_eq!(source.canonical_provider_addr(&plain), plain);
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let err = RegistrySource::open("/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingRoot(_)));
    }
}
