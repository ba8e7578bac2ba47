use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_DOC_NAME_LEN: usize = 255;

/// Non-root documentation categories, in canonical emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocCategory {
    Resources,
    Datasources,
    Functions,
    Guides,
    Ephemeral,
}

impl DocCategory {
    pub const ALL: [DocCategory; 5] = [
        DocCategory::Resources,
        DocCategory::Datasources,
        DocCategory::Functions,
        DocCategory::Guides,
        DocCategory::Ephemeral,
    ];

    /// Directory name used under a version prefix in object storage.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            DocCategory::Resources => "resources",
            DocCategory::Datasources => "datasources",
            DocCategory::Functions => "functions",
            DocCategory::Guides => "guides",
            DocCategory::Ephemeral => "ephemeral",
        }
    }

    /// Maps a source-tree directory name to its category.
    ///
    /// The table covers both legacy and modern provider layouts.
    pub fn from_source_dir(dir: &str) -> Option<Self> {
        match dir {
            "r" | "resources" => Some(DocCategory::Resources),
            "d" | "data-sources" | "datasources" => Some(DocCategory::Datasources),
            "f" | "functions" => Some(DocCategory::Functions),
            "guides" => Some(DocCategory::Guides),
            "ephemeral" | "ephemeral-resources" => Some(DocCategory::Ephemeral),
            _ => None,
        }
    }
}

/// Languages supported for CDKTF documentation subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdktfLanguage {
    Python,
    Typescript,
    Csharp,
    Java,
    Go,
}

pub const CDKTF_LANGUAGES: [CdktfLanguage; 5] = [
    CdktfLanguage::Python,
    CdktfLanguage::Typescript,
    CdktfLanguage::Csharp,
    CdktfLanguage::Java,
    CdktfLanguage::Go,
];

impl CdktfLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdktfLanguage::Python => "python",
            CdktfLanguage::Typescript => "typescript",
            CdktfLanguage::Csharp => "csharp",
            CdktfLanguage::Java => "java",
            CdktfLanguage::Go => "go",
        }
    }
}

impl FromStr for CdktfLanguage {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "python" => Ok(CdktfLanguage::Python),
            "typescript" => Ok(CdktfLanguage::Typescript),
            "csharp" => Ok(CdktfLanguage::Csharp),
            "java" => Ok(CdktfLanguage::Java),
            "go" => Ok(CdktfLanguage::Go),
            _ => Err(TypesError::InvalidLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for CdktfLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checks a document name against the storage constraints:
/// `[A-Za-z0-9 ._-]`, between 1 and 255 characters.
pub fn validate_doc_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_DOC_NAME_LEN {
        return Err(TypesError::InvalidDocName(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
    {
        return Err(TypesError::InvalidDocName(name.to_string()));
    }
    Ok(())
}

/// Normalizes a document name for storage: lowercase, characters outside
/// `[A-Za-z0-9-_.]` dropped. Idempotent.
pub fn normalize_doc_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Summary fields of one documentation file, as persisted in a version doc.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocItemDetails {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub edit_link: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subcategory: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A scraped documentation file: the persisted summary plus the markdown body
/// destined for object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocItem {
    pub category: Option<DocCategory>,
    pub language: Option<CdktfLanguage>,
    pub details: DocItemDetails,
    pub contents: String,
}

impl DocItem {
    /// True for the version's root document (`index.md`).
    pub fn is_root(&self) -> bool {
        self.category.is_none()
    }
}

/// Per-version documentation tree, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<DocItemDetails>,
    #[serde(default)]
    pub resources: Vec<DocItemDetails>,
    #[serde(default)]
    pub datasources: Vec<DocItemDetails>,
    #[serde(default)]
    pub functions: Vec<DocItemDetails>,
    #[serde(default)]
    pub guides: Vec<DocItemDetails>,
    #[serde(default)]
    pub ephemeral: Vec<DocItemDetails>,
}

impl Docs {
    pub fn category_mut(&mut self, category: DocCategory) -> &mut Vec<DocItemDetails> {
        match category {
            DocCategory::Resources => &mut self.resources,
            DocCategory::Datasources => &mut self.datasources,
            DocCategory::Functions => &mut self.functions,
            DocCategory::Guides => &mut self.guides,
            DocCategory::Ephemeral => &mut self.ephemeral,
        }
    }

    pub fn category(&self, category: DocCategory) -> &Vec<DocItemDetails> {
        match category {
            DocCategory::Resources => &self.resources,
            DocCategory::Datasources => &self.datasources,
            DocCategory::Functions => &self.functions,
            DocCategory::Guides => &self.guides,
            DocCategory::Ephemeral => &self.ephemeral,
        }
    }

    /// Inserts an item, last write winning on a `(category, name)` collision.
    pub fn insert(&mut self, category: DocCategory, details: DocItemDetails) {
        let bucket = self.category_mut(category);
        bucket.retain(|existing| existing.name != details.name);
        bucket.push(details);
    }

    /// Sorts every category bucket by name; serialization order is then
    /// deterministic.
    pub fn sort(&mut self) {
        for category in DocCategory::ALL {
            self.category_mut(category)
                .sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none() && DocCategory::ALL.iter().all(|c| self.category(*c).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_dir_mapping_covers_legacy_names() {
        assert_eq!(
            DocCategory::from_source_dir("r"),
            Some(DocCategory::Resources)
        );
        assert_eq!(
            DocCategory::from_source_dir("data-sources"),
            Some(DocCategory::Datasources)
        );
        assert_eq!(
            DocCategory::from_source_dir("ephemeral-resources"),
            Some(DocCategory::Ephemeral)
        );
        assert_eq!(DocCategory::from_source_dir("cdktf"), None);
    }

    #[test]
    fn normalize_doc_name_is_idempotent() {
        let once = normalize_doc_name("Widget (Beta)!.md");
        let twice = normalize_doc_name(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "widgetbeta.md");
    }

    #[test]
    fn validate_doc_name_bounds() {
        assert!(validate_doc_name("widget_frame-v2.md").is_ok());
        assert!(validate_doc_name("with space").is_ok());
        assert!(validate_doc_name("").is_err());
        assert!(validate_doc_name(&"x".repeat(256)).is_err());
        assert!(validate_doc_name("bad/slash").is_err());
    }

    #[test]
    fn language_round_trip() {
        for lang in CDKTF_LANGUAGES {
            let parsed: CdktfLanguage = lang.as_str().parse().unwrap();
            assert_eq!(parsed, lang);
        }
        assert!("rust".parse::<CdktfLanguage>().is_err());
    }

    #[test]
    fn docs_insert_last_write_wins() {
        let mut docs = Docs::default();
        docs.insert(
            DocCategory::Resources,
            DocItemDetails {
                name: "widget".into(),
                title: "old".into(),
                ..Default::default()
            },
        );
        docs.insert(
            DocCategory::Resources,
            DocItemDetails {
                name: "widget".into(),
                title: "new".into(),
                ..Default::default()
            },
        );
        assert_eq!(docs.resources.len(), 1);
        assert_eq!(docs.resources[0].title, "new");
    }

    #[test]
    fn docs_sort_orders_by_name() {
        let mut docs = Docs::default();
        for name in ["zeta", "alpha", "mid"] {
            docs.insert(
                DocCategory::Guides,
                DocItemDetails {
                    name: name.into(),
                    ..Default::default()
                },
            );
        }
        docs.sort();
        let names: Vec<&str> = docs.guides.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
