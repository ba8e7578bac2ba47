//! Construction of search index items from entity state.
//!
//! Each entity contributes one item for itself plus one item per searchable
//! document of its latest version. The whole family is rebuilt on every
//! successful entity pass: the entity item is removed first, which cascades
//! to its children, and the fresh set is added back.

use std::collections::BTreeMap;

use chrono::Utc;
use regindex_search::{IndexItem, IndexType, MetaIndex};
use regindex_types::{
    DocItemDetails, ModuleDescriptor, ModuleVersionDoc, ProviderDescriptor, ProviderVersionDoc,
};

use crate::error::Result;

/// Replaces the search item family of a provider with one built from its
/// latest version.
pub(crate) fn sync_provider(
    meta: &MetaIndex,
    descriptor: &ProviderDescriptor,
    latest: &ProviderVersionDoc,
) -> Result<()> {
    let entity_id = descriptor.addr.index_id();
    let version = latest.id.to_string();
    meta.remove_item(&entity_id);

    let mut link = BTreeMap::new();
    link.insert("namespace".to_string(), descriptor.addr.namespace.clone());
    link.insert("name".to_string(), descriptor.addr.name.clone());
    link.insert("version".to_string(), version.clone());
    meta.add(IndexItem {
        id: entity_id.clone(),
        item_type: IndexType::Provider,
        addr: descriptor.addr.display.clone(),
        version: version.clone(),
        title: descriptor.addr.display.clone(),
        description: descriptor.description.clone(),
        link_variables: link.clone(),
        parent_id: String::new(),
        popularity: descriptor.popularity,
        warnings: 0,
        last_updated: Utc::now(),
    })?;

    let groups: [(&[DocItemDetails], &str, IndexType); 3] = [
        (&latest.docs.resources, "resources", IndexType::ProviderResource),
        (
            &latest.docs.datasources,
            "datasources",
            IndexType::ProviderDatasource,
        ),
        (&latest.docs.functions, "functions", IndexType::ProviderFunction),
    ];
    for (items, dir, item_type) in groups {
        for details in items {
            let mut doc_link = link.clone();
            doc_link.insert("id".to_string(), details.name.clone());
            meta.add(IndexItem {
                id: format!("{}/{}/{}", entity_id, dir, details.name),
                item_type,
                addr: descriptor.addr.display.clone(),
                version: version.clone(),
                title: non_empty(&details.title, &details.name),
                description: details.description.clone(),
                link_variables: doc_link,
                parent_id: entity_id.clone(),
                popularity: descriptor.popularity,
                warnings: 0,
                last_updated: Utc::now(),
            })?;
        }
    }
    Ok(())
}

/// Replaces the search item family of a module with one built from its
/// latest version.
pub(crate) fn sync_module(
    meta: &MetaIndex,
    descriptor: &ModuleDescriptor,
    latest: &ModuleVersionDoc,
) -> Result<()> {
    let entity_id = descriptor.addr.index_id();
    let version = latest.id.to_string();
    meta.remove_item(&entity_id);

    let mut link = BTreeMap::new();
    link.insert("namespace".to_string(), descriptor.addr.namespace.clone());
    link.insert("name".to_string(), descriptor.addr.name.clone());
    link.insert(
        "target_system".to_string(),
        descriptor.addr.target_system.clone(),
    );
    link.insert("version".to_string(), version.clone());
    meta.add(IndexItem {
        id: entity_id.clone(),
        item_type: IndexType::Module,
        addr: descriptor.addr.display.clone(),
        version: version.clone(),
        title: descriptor.addr.display.clone(),
        description: descriptor.description.clone(),
        link_variables: link.clone(),
        parent_id: String::new(),
        popularity: descriptor.popularity,
        warnings: 0,
        last_updated: Utc::now(),
    })?;

    for name in latest.submodules.keys() {
        let mut sub_link = link.clone();
        sub_link.insert("submodule".to_string(), name.clone());
        meta.add(IndexItem {
            id: format!("{}/submodules/{}", entity_id, name),
            item_type: IndexType::ModuleSubmodule,
            addr: descriptor.addr.display.clone(),
            version: version.clone(),
            title: name.clone(),
            description: String::new(),
            link_variables: sub_link,
            parent_id: entity_id.clone(),
            popularity: descriptor.popularity,
            warnings: 0,
            last_updated: Utc::now(),
        })?;
    }
    Ok(())
}

fn non_empty(preferred: &str, fallback: &str) -> String {
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}
