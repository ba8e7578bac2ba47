use crate::addr::{ModuleAddr, ProviderAddr};
use crate::docs::{CdktfLanguage, Docs};
use crate::license::LicenseList;
use crate::version::{VersionDescriptor, VersionNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider entry in the top-level listing and in its own `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub addr: ProviderAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<ProviderAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_addr: Option<ProviderAddr>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ProviderAddr>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blocked_reason: String,
    #[serde(default)]
    pub versions: Vec<VersionDescriptor>,
}

impl ProviderDescriptor {
    pub fn new(addr: ProviderAddr) -> Self {
        Self {
            addr,
            alias_of: None,
            canonical_addr: None,
            description: String::new(),
            popularity: 0,
            fork_of: None,
            is_blocked: false,
            blocked_reason: String::new(),
            versions: Vec::new(),
        }
    }

    pub fn has_version(&self, version: &VersionNumber) -> bool {
        self.versions.iter().any(|v| &v.id == version)
    }

    /// Inserts or refreshes a version entry, keeping the list sorted
    /// descending and duplicate-free.
    pub fn upsert_version(&mut self, descriptor: VersionDescriptor) {
        self.versions.retain(|v| v.id != descriptor.id);
        self.versions.push(descriptor);
        VersionDescriptor::sort_descending(&mut self.versions);
    }

    pub fn remove_version(&mut self, version: &VersionNumber) {
        self.versions.retain(|v| &v.id != version);
    }
}

/// Module entry; same shape as a provider minus alias pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub addr: ModuleAddr,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ModuleAddr>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blocked_reason: String,
    #[serde(default)]
    pub versions: Vec<VersionDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(addr: ModuleAddr) -> Self {
        Self {
            addr,
            description: String::new(),
            popularity: 0,
            fork_of: None,
            is_blocked: false,
            blocked_reason: String::new(),
            versions: Vec::new(),
        }
    }

    pub fn has_version(&self, version: &VersionNumber) -> bool {
        self.versions.iter().any(|v| &v.id == version)
    }

    pub fn upsert_version(&mut self, descriptor: VersionDescriptor) {
        self.versions.retain(|v| v.id != descriptor.id);
        self.versions.push(descriptor);
        VersionDescriptor::sort_descending(&mut self.versions);
    }

    pub fn remove_version(&mut self, version: &VersionNumber) {
        self.versions.retain(|v| &v.id != version);
    }
}

/// Top-level `providers/index.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderList {
    pub providers: Vec<ProviderDescriptor>,
}

impl ProviderList {
    /// Replaces or inserts a descriptor, keeping the list sorted by address.
    pub fn upsert(&mut self, descriptor: ProviderDescriptor) {
        self.providers.retain(|p| p.addr != descriptor.addr);
        self.providers.push(descriptor);
        self.providers.sort_by(|a, b| a.addr.cmp(&b.addr));
    }

    pub fn remove(&mut self, addr: &ProviderAddr) {
        self.providers.retain(|p| &p.addr != addr);
    }
}

/// Top-level `modules/index.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleList {
    pub modules: Vec<ModuleDescriptor>,
}

impl ModuleList {
    pub fn upsert(&mut self, descriptor: ModuleDescriptor) {
        self.modules.retain(|m| m.addr != descriptor.addr);
        self.modules.push(descriptor);
        self.modules.sort_by(|a, b| a.addr.cmp(&b.addr));
    }

    pub fn remove(&mut self, addr: &ModuleAddr) {
        self.modules.retain(|m| &m.addr != addr);
    }
}

/// Per-version record of a provider: `providers/<ns>/<name>/<ver>/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderVersionDoc {
    pub id: VersionNumber,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub docs: Docs,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cdktf_docs: BTreeMap<CdktfLanguage, Docs>,
    #[serde(default, skip_serializing_if = "LicenseList::is_empty")]
    pub licenses: LicenseList,
    #[serde(default)]
    pub incompatible_license: bool,
    /// Human browse URL for this version's source, when the host is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}

/// Declared input variable of a module, from the schema extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleVariable {
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub required: bool,
}

/// Declared output of a module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutput {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub sensitive: bool,
}

/// Shared details of a module root, submodule, or example directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDetails {
    #[serde(default)]
    pub readme: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edit_link: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, ModuleVariable>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ModuleOutput>,
    /// Sanitized stderr of a failed schema extraction; empty on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema_error: String,
}

impl ModuleDetails {
    /// Replaces variables/outputs with a fresh extraction: keys absent from
    /// the new set are dropped, new keys added.
    pub fn merge_schema(
        &mut self,
        variables: BTreeMap<String, ModuleVariable>,
        outputs: BTreeMap<String, ModuleOutput>,
    ) {
        self.variables = variables;
        self.outputs = outputs;
        self.schema_error = String::new();
    }
}

/// Per-version record of a module:
/// `modules/<ns>/<name>/<target>/<ver>/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleVersionDoc {
    pub id: VersionNumber,
    pub published: DateTime<Utc>,
    #[serde(flatten)]
    pub details: ModuleDetails,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub submodules: BTreeMap<String, ModuleDetails>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, ModuleDetails>,
    #[serde(default, skip_serializing_if = "LicenseList::is_empty")]
    pub licenses: LicenseList,
    #[serde(default)]
    pub incompatible_license: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn descriptor(version: &str) -> VersionDescriptor {
        VersionDescriptor {
            id: VersionNumber::parse(version).unwrap(),
            published: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn upsert_version_keeps_descending_order() {
        let mut provider =
            ProviderDescriptor::new(ProviderAddr::new("acme", "foo").unwrap());
        provider.upsert_version(descriptor("1.0.0"));
        provider.upsert_version(descriptor("2.0.0"));
        provider.upsert_version(descriptor("1.5.0"));
        // Same id again must not duplicate.
        provider.upsert_version(descriptor("2.0.0"));

        let ids: Vec<String> = provider.versions.iter().map(|v| v.id.to_string()).collect();
        assert_eq!(ids, vec!["2.0.0", "1.5.0", "1.0.0"]);
    }

    #[test]
    fn provider_list_sorted_by_addr() {
        let mut list = ProviderList::default();
        list.upsert(ProviderDescriptor::new(
            ProviderAddr::new("zeta", "x").unwrap(),
        ));
        list.upsert(ProviderDescriptor::new(
            ProviderAddr::new("acme", "x").unwrap(),
        ));
        assert_eq!(list.providers[0].addr.namespace, "acme");
        assert_eq!(list.providers[1].addr.namespace, "zeta");
    }

    #[test]
    fn provider_entity_round_trips() {
        let mut provider =
            ProviderDescriptor::new(ProviderAddr::new("Acme", "Foo").unwrap());
        provider.description = "A provider".into();
        provider.is_blocked = true;
        provider.blocked_reason = "policy".into();
        provider.upsert_version(descriptor("v1.2.3"));

        let json = serde_json::to_string_pretty(&provider).unwrap();
        let back: ProviderDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(provider, back);
        assert!(json.contains("\"display\": \"Acme/Foo\""));
    }

    #[test]
    fn module_version_doc_round_trips() {
        let mut details = ModuleDetails {
            readme: true,
            ..Default::default()
        };
        details.variables.insert(
            "region".into(),
            ModuleVariable {
                type_: "string".into(),
                required: true,
                ..Default::default()
            },
        );
        let doc = ModuleVersionDoc {
            id: VersionNumber::parse("1.0.0").unwrap(),
            published: Utc.with_ymd_and_hms(2024, 3, 2, 1, 0, 0).unwrap(),
            details,
            submodules: BTreeMap::new(),
            examples: BTreeMap::new(),
            licenses: LicenseList::default(),
            incompatible_license: false,
            link: String::new(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        let back: ModuleVersionDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn merge_schema_drops_missing_keys() {
        let mut details = ModuleDetails::default();
        details
            .variables
            .insert("old".into(), ModuleVariable::default());
        details.schema_error = "previous failure".into();

        let mut fresh = BTreeMap::new();
        fresh.insert("new".into(), ModuleVariable::default());
        details.merge_schema(fresh, BTreeMap::new());

        assert!(details.variables.contains_key("new"));
        assert!(!details.variables.contains_key("old"));
        assert!(details.schema_error.is_empty());
    }
}
