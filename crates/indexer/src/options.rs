//! Run configuration: scope filters, block lists and forced regeneration.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use regindex_registry::Filter;
use regindex_types::{ModuleAddr, ProviderAddr, VersionNumber};
use serde::Deserialize;

use crate::error::{IndexerError, Result};

/// Policy hook deciding whether an entity may be indexed at all. Blocked
/// entities keep their listing entry with the reason attached, while their
/// stored documents are removed.
pub trait BlockList: Send + Sync {
    /// The blocking reason, or `None` when the entity is allowed.
    fn provider_blocked(&self, addr: &ProviderAddr) -> Option<String>;
    fn module_blocked(&self, addr: &ModuleAddr) -> Option<String>;
}

/// Allows everything; the registry metadata's own `blocked` flag still
/// applies.
#[derive(Debug, Default)]
pub struct NoBlockList;

impl BlockList for NoBlockList {
    fn provider_blocked(&self, _addr: &ProviderAddr) -> Option<String> {
        None
    }

    fn module_blocked(&self, _addr: &ModuleAddr) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
struct BlockListFile {
    #[serde(default)]
    providers: HashMap<String, String>,
    #[serde(default)]
    modules: HashMap<String, String>,
}

/// Block list loaded from a JSON file:
///
/// ```json
/// {
///   "providers": {"acme/foo": "DMCA takedown"},
///   "modules": {"acme/compute/aws": "malware"}
/// }
/// ```
#[derive(Debug, Default)]
pub struct FileBlockList {
    providers: HashMap<String, String>,
    modules: HashMap<String, String>,
}

impl FileBlockList {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let parsed: BlockListFile = serde_json::from_slice(&bytes)?;
        let lower = |map: HashMap<String, String>| {
            map.into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect()
        };
        Ok(Self {
            providers: lower(parsed.providers),
            modules: lower(parsed.modules),
        })
    }
}

impl BlockList for FileBlockList {
    fn provider_blocked(&self, addr: &ProviderAddr) -> Option<String> {
        self.providers
            .get(&format!("{}/{}", addr.namespace, addr.name))
            .cloned()
    }

    fn module_blocked(&self, addr: &ModuleAddr) -> Option<String> {
        self.modules
            .get(&format!(
                "{}/{}/{}",
                addr.namespace, addr.name, addr.target_system
            ))
            .cloned()
    }
}

/// Decides whether an already-indexed version must be scraped again.
pub trait ForceRegenerate: Send + Sync {
    fn provider(&self, addr: &ProviderAddr, version: &VersionNumber) -> bool;
    fn module(&self, addr: &ModuleAddr, version: &VersionNumber) -> bool;
}

#[derive(Debug, Default)]
pub struct NeverRegenerate;

impl ForceRegenerate for NeverRegenerate {
    fn provider(&self, _addr: &ProviderAddr, _version: &VersionNumber) -> bool {
        false
    }

    fn module(&self, _addr: &ModuleAddr, _version: &VersionNumber) -> bool {
        false
    }
}

/// Selector list loaded from a text file, one selector per line:
/// `namespace/name` regenerates every version, `namespace/name@1.2.3` a
/// single one. Module selectors carry three address segments. Blank lines
/// and `#` comments are skipped.
#[derive(Debug, Default)]
pub struct SelectorRegenerate {
    selectors: HashSet<String>,
}

impl SelectorRegenerate {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let selectors = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_ascii_lowercase)
            .collect();
        Self { selectors }
    }

    fn matches(&self, addr: &str, version: &VersionNumber) -> bool {
        self.selectors.contains(addr) || self.selectors.contains(&format!("{addr}@{version}"))
    }
}

impl ForceRegenerate for SelectorRegenerate {
    fn provider(&self, addr: &ProviderAddr, version: &VersionNumber) -> bool {
        self.matches(&format!("{}/{}", addr.namespace, addr.name), version)
    }

    fn module(&self, addr: &ModuleAddr, version: &VersionNumber) -> bool {
        self.matches(
            &format!("{}/{}/{}", addr.namespace, addr.name, addr.target_system),
            version,
        )
    }
}

/// Scope and policy of one generation run.
#[derive(Clone)]
pub struct GenerateOptions {
    /// Namespace or address filter; matches everything by default.
    pub namespace: Filter,
    pub skip_providers: bool,
    pub skip_modules: bool,
    pub force: Arc<dyn ForceRegenerate>,
    pub blocklist: Arc<dyn BlockList>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            namespace: Filter::default(),
            skip_providers: false,
            skip_modules: false,
            force: Arc::new(NeverRegenerate),
            blocklist: Arc::new(NoBlockList),
        }
    }
}

impl GenerateOptions {
    /// At least one of the two entity kinds must remain enabled.
    pub fn validate(&self) -> Result<()> {
        if self.skip_providers && self.skip_modules {
            return Err(IndexerError::InvalidOptions(
                "both provider and module updates are skipped; nothing to do".into(),
            ));
        }
        Ok(())
    }
}
