use crate::error::{Result, SearchError};
use crate::record::{IndexItem, IndexType, SearchRecord, StreamDeletion, StreamHeader};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// Persisted portion of the meta index (`metaindex.json`).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetaIndexState {
    #[serde(default)]
    pub items: BTreeMap<String, IndexItem>,
    #[serde(default)]
    pub deletions: BTreeMap<String, DateTime<Utc>>,
}

struct Inner {
    state: MetaIndexState,
    /// parent id -> child ids, rebuilt on load, kept in step with `items`.
    by_parent: HashMap<String, HashSet<String>>,
}

/// Accumulates add/remove records across a run. All operations serialize on
/// one lock; cascade removal walks `by_parent` instead of rescanning items.
#[derive(Default)]
pub struct MetaIndex {
    inner: Mutex<Inner>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: MetaIndexState::default(),
            by_parent: HashMap::new(),
        }
    }
}

impl MetaIndex {
    pub fn from_state(state: MetaIndexState) -> Self {
        let mut by_parent: HashMap<String, HashSet<String>> = HashMap::new();
        for item in state.items.values() {
            if !item.parent_id.is_empty() {
                by_parent
                    .entry(item.parent_id.clone())
                    .or_default()
                    .insert(item.id.clone());
            }
        }
        Self {
            inner: Mutex::new(Inner { state, by_parent }),
        }
    }

    pub fn state(&self) -> MetaIndexState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Validates and upserts one item; `last_updated` is refreshed and any
    /// tombstone for the same id is cleared.
    pub fn add(&self, mut item: IndexItem) -> Result<()> {
        if item.id.trim().is_empty() {
            return Err(SearchError::InvalidItem("empty id".into()));
        }
        if item.title.trim().is_empty() {
            return Err(SearchError::InvalidItem(format!("{}: empty title", item.id)));
        }
        if item.addr.trim().is_empty() {
            return Err(SearchError::InvalidItem(format!("{}: empty addr", item.id)));
        }
        if item.version.trim().is_empty() {
            return Err(SearchError::InvalidItem(format!(
                "{}: empty version",
                item.id
            )));
        }
        if item.link_variables.is_empty() {
            return Err(SearchError::InvalidItem(format!(
                "{}: no link variables",
                item.id
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        if !item.parent_id.is_empty() && !inner.state.items.contains_key(&item.parent_id) {
            return Err(SearchError::ParentNotFound(item.parent_id));
        }

        item.last_updated = Utc::now();
        if let Some(previous) = inner.state.items.get(&item.id) {
            let old_parent = previous.parent_id.clone();
            if old_parent != item.parent_id && !old_parent.is_empty() {
                if let Some(children) = inner.by_parent.get_mut(&old_parent) {
                    children.remove(&item.id);
                }
            }
        }
        if !item.parent_id.is_empty() {
            inner
                .by_parent
                .entry(item.parent_id.clone())
                .or_default()
                .insert(item.id.clone());
        }
        inner.state.deletions.remove(&item.id);
        inner.state.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Removes `id` and everything parented under it, transitively,
    /// tombstoning each removed id.
    pub fn remove_item(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        let mut queue = vec![id.to_string()];
        let now = Utc::now();
        while let Some(current) = queue.pop() {
            if let Some(children) = inner.by_parent.remove(&current) {
                queue.extend(children);
            }
            if let Some(removed) = inner.state.items.remove(&current) {
                if !removed.parent_id.is_empty() {
                    if let Some(siblings) = inner.by_parent.get_mut(&removed.parent_id) {
                        siblings.remove(&current);
                    }
                }
                inner.state.deletions.insert(current, now);
            }
        }
    }

    /// Removes every item matching all three fields, cascading normally.
    pub fn remove_version_items(&self, item_type: IndexType, addr: &str, version: &str) {
        let matching: Vec<String> = {
            let inner = self.inner.lock().unwrap();
            inner
                .state
                .items
                .values()
                .filter(|item| {
                    item.item_type == item_type && item.addr == addr && item.version == version
                })
                .map(|item| item.id.clone())
                .collect()
        };
        for id in matching {
            self.remove_item(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().state.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emits the NDJSON stream: header, then every tombstone, then every
    /// live item.
    pub fn generate(&self) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        let mut out = String::new();

        let header = SearchRecord::Header {
            header: StreamHeader {
                last_updated: Utc::now(),
            },
        };
        out.push_str(&serde_json::to_string(&header)?);
        out.push('\n');

        for (id, deleted_at) in &inner.state.deletions {
            let record = SearchRecord::Delete {
                deletion: StreamDeletion {
                    id: id.clone(),
                    deleted_at: *deleted_at,
                },
            };
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }

        for item in inner.state.items.values() {
            let record = SearchRecord::Add {
                addition: item.clone(),
            };
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str, parent: &str, item_type: IndexType) -> IndexItem {
        let mut link = BTreeMap::new();
        link.insert("id".to_string(), id.to_string());
        IndexItem {
            id: id.into(),
            item_type,
            addr: "acme/foo".into(),
            version: "1.0.0".into(),
            title: id.into(),
            description: String::new(),
            link_variables: link,
            parent_id: parent.into(),
            popularity: 0,
            warnings: 0,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn add_validates_required_fields() {
        let index = MetaIndex::default();
        let mut bad = item("", "", IndexType::Provider);
        bad.id = String::new();
        assert!(index.add(bad).is_err());

        let mut no_link = item("providers/acme/foo", "", IndexType::Provider);
        no_link.link_variables.clear();
        assert!(index.add(no_link).is_err());

        let orphan = item("child", "missing-parent", IndexType::ProviderResource);
        assert!(matches!(
            index.add(orphan),
            Err(SearchError::ParentNotFound(_))
        ));
    }

    #[test]
    fn remove_item_cascades_through_descendants() {
        let index = MetaIndex::default();
        index.add(item("root", "", IndexType::Provider)).unwrap();
        index
            .add(item("mid", "root", IndexType::ProviderResource))
            .unwrap();
        index
            .add(item("leaf", "mid", IndexType::ProviderResource))
            .unwrap();
        index.add(item("other", "", IndexType::Provider)).unwrap();

        index.remove_item("root");

        let state = index.state();
        assert_eq!(state.items.len(), 1);
        assert!(state.items.contains_key("other"));
        let mut deleted: Vec<&str> = state.deletions.keys().map(|s| s.as_str()).collect();
        deleted.sort();
        assert_eq!(deleted, vec!["leaf", "mid", "root"]);
    }

    #[test]
    fn remove_version_items_matches_all_three_fields() {
        let index = MetaIndex::default();
        let mut v1 = item("providers/acme/foo", "", IndexType::Provider);
        v1.version = "1.0.0".into();
        let mut v2 = item("providers/acme/foo-2", "", IndexType::Provider);
        v2.version = "2.0.0".into();
        index.add(v1).unwrap();
        index.add(v2).unwrap();

        index.remove_version_items(IndexType::Provider, "acme/foo", "1.0.0");

        let state = index.state();
        assert!(!state.items.contains_key("providers/acme/foo"));
        assert!(state.items.contains_key("providers/acme/foo-2"));
    }

    #[test]
    fn re_adding_clears_tombstone() {
        let index = MetaIndex::default();
        index.add(item("root", "", IndexType::Provider)).unwrap();
        index.remove_item("root");
        assert_eq!(index.state().deletions.len(), 1);

        index.add(item("root", "", IndexType::Provider)).unwrap();
        assert!(index.state().deletions.is_empty());
    }

    #[test]
    fn generate_orders_header_deletes_adds() {
        let index = MetaIndex::default();
        index.add(item("keep", "", IndexType::Module)).unwrap();
        index.add(item("gone", "", IndexType::Module)).unwrap();
        index.remove_item("gone");

        let stream = index.generate().unwrap();
        let lines: Vec<&str> = stream.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"type\":\"header\""));
        assert!(lines[1].contains("\"type\":\"delete\""));
        assert!(lines[1].contains("\"gone\""));
        assert!(lines[2].contains("\"type\":\"add\""));
        assert!(lines[2].contains("\"keep\""));

        // Every line must parse back into a record.
        for line in lines {
            let _: SearchRecord = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn state_round_trips_and_rebuilds_parents() {
        let index = MetaIndex::default();
        index.add(item("root", "", IndexType::Provider)).unwrap();
        index
            .add(item("leaf", "root", IndexType::ProviderResource))
            .unwrap();

        let json = serde_json::to_string(&index.state()).unwrap();
        let state: MetaIndexState = serde_json::from_str(&json).unwrap();
        let reloaded = MetaIndex::from_state(state);

        reloaded.remove_item("root");
        assert!(reloaded.state().items.is_empty(), "cascade must survive reload");
    }
}
