use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of searchable document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    #[serde(rename = "provider")]
    Provider,
    #[serde(rename = "provider/resource")]
    ProviderResource,
    #[serde(rename = "provider/datasource")]
    ProviderDatasource,
    #[serde(rename = "provider/function")]
    ProviderFunction,
    #[serde(rename = "module")]
    Module,
    #[serde(rename = "module/submodule")]
    ModuleSubmodule,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexType::Provider => "provider",
            IndexType::ProviderResource => "provider/resource",
            IndexType::ProviderDatasource => "provider/datasource",
            IndexType::ProviderFunction => "provider/function",
            IndexType::Module => "module",
            IndexType::ModuleSubmodule => "module/submodule",
        };
        write!(f, "{s}")
    }
}

/// One live entry in the meta index and the `add` payload in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: IndexType,
    pub addr: String,
    pub version: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Variables the UI interpolates into a result link, e.g.
    /// `{"namespace": "acme", "name": "foo", "version": "1.2.3"}`.
    #[serde(rename = "link")]
    pub link_variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub warnings: i64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDeletion {
    pub id: String,
    pub deleted_at: DateTime<Utc>,
}

/// One NDJSON line, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchRecord {
    Header { header: StreamHeader },
    Delete { deletion: StreamDeletion },
    Add { addition: IndexItem },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_lines_round_trip_with_tag() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let header = SearchRecord::Header {
            header: StreamHeader { last_updated: ts },
        };
        let line = serde_json::to_string(&header).unwrap();
        assert!(line.starts_with("{\"type\":\"header\""));
        let back: SearchRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(header, back);
    }

    #[test]
    fn index_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&IndexType::ProviderDatasource).unwrap(),
            "\"provider/datasource\""
        );
        assert_eq!(
            serde_json::from_str::<IndexType>("\"module/submodule\"").unwrap(),
            IndexType::ModuleSubmodule
        );
    }

    #[test]
    fn link_variables_serialize_as_link() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut link = BTreeMap::new();
        link.insert("namespace".to_string(), "acme".to_string());
        let item = IndexItem {
            id: "providers/acme/foo".into(),
            item_type: IndexType::Provider,
            addr: "acme/foo".into(),
            version: "1.0.0".into(),
            title: "foo".into(),
            description: String::new(),
            link_variables: link,
            parent_id: String::new(),
            popularity: 0,
            warnings: 0,
            last_updated: ts,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"link\":{\"namespace\":\"acme\"}"));
        assert!(!json.contains("parent_id"));
    }
}
