use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Address of a provider: `namespace/name`.
///
/// The `namespace` and `name` fields are normalized to lowercase and are the
/// identity of the address; `display` preserves the casing the registry
/// advertised and is only used for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAddr {
    pub namespace: String,
    pub name: String,
    pub display: String,
}

impl ProviderAddr {
    pub fn new(namespace: &str, name: &str) -> Result<Self> {
        if !valid_segment(namespace) || !valid_segment(name) {
            return Err(TypesError::InvalidProviderAddr(format!(
                "{namespace}/{name}"
            )));
        }
        Ok(Self {
            namespace: namespace.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
            display: format!("{namespace}/{name}"),
        })
    }

    /// Storage key prefix for this provider, e.g. `providers/acme/foo`.
    pub fn storage_prefix(&self) -> String {
        format!("providers/{}/{}", self.namespace, self.name)
    }

    /// Stable identifier used as a search index id, e.g. `providers/acme/foo`.
    pub fn index_id(&self) -> String {
        self.storage_prefix()
    }
}

impl FromStr for ProviderAddr {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [ns, name] => Self::new(ns, name),
            _ => Err(TypesError::InvalidProviderAddr(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl PartialEq for ProviderAddr {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl Eq for ProviderAddr {}

impl Hash for ProviderAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for ProviderAddr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProviderAddr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.namespace, &self.name).cmp(&(&other.namespace, &other.name))
    }
}

/// Address of a module: `namespace/name/target_system`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleAddr {
    pub namespace: String,
    pub name: String,
    pub target_system: String,
    pub display: String,
}

impl ModuleAddr {
    pub fn new(namespace: &str, name: &str, target_system: &str) -> Result<Self> {
        if !valid_segment(namespace) || !valid_segment(name) || !valid_segment(target_system) {
            return Err(TypesError::InvalidModuleAddr(format!(
                "{namespace}/{name}/{target_system}"
            )));
        }
        Ok(Self {
            namespace: namespace.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
            target_system: target_system.to_ascii_lowercase(),
            display: format!("{namespace}/{name}/{target_system}"),
        })
    }

    /// Storage key prefix, e.g. `modules/acme/compute/aws`.
    pub fn storage_prefix(&self) -> String {
        format!(
            "modules/{}/{}/{}",
            self.namespace, self.name, self.target_system
        )
    }

    pub fn index_id(&self) -> String {
        self.storage_prefix()
    }
}

impl FromStr for ModuleAddr {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [ns, name, target] => Self::new(ns, name, target),
            _ => Err(TypesError::InvalidModuleAddr(s.to_string())),
        }
    }
}

impl fmt::Display for ModuleAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl PartialEq for ModuleAddr {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.target_system == other.target_system
    }
}

impl Eq for ModuleAddr {}

impl Hash for ModuleAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
        self.target_system.hash(state);
    }
}

impl PartialOrd for ModuleAddr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleAddr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.namespace, &self.name, &self.target_system).cmp(&(
            &other.namespace,
            &other.name,
            &other.target_system,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn provider_addr_normalizes_but_preserves_display() {
        let addr = ProviderAddr::new("Acme", "Foo").unwrap();
        assert_eq!(addr.namespace, "acme");
        assert_eq!(addr.name, "foo");
        assert_eq!(addr.display, "Acme/Foo");
        assert_eq!(addr.to_string(), "Acme/Foo");
    }

    #[test]
    fn provider_addr_equality_ignores_case() {
        let a = ProviderAddr::new("Acme", "Foo").unwrap();
        let b: ProviderAddr = "acme/foo".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn provider_addr_rejects_bad_segments() {
        assert!(ProviderAddr::new("", "foo").is_err());
        assert!(ProviderAddr::new("a cme", "foo").is_err());
        assert!("acme".parse::<ProviderAddr>().is_err());
        assert!("a/b/c".parse::<ProviderAddr>().is_err());
    }

    #[test]
    fn module_addr_storage_prefix() {
        let addr = ModuleAddr::new("Acme", "Compute", "AWS").unwrap();
        assert_eq!(addr.storage_prefix(), "modules/acme/compute/aws");
        assert_eq!(addr.display, "Acme/Compute/AWS");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = ProviderAddr::new("ACME", "Foo").unwrap();
        let twice = ProviderAddr::new(&once.namespace, &once.name).unwrap();
        assert_eq!(once.namespace, twice.namespace);
        assert_eq!(once.name, twice.name);
    }
}
