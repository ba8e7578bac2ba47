//! Per-module generation: mirrors the provider pipeline with schema
//! extraction in the scrape step.

use std::collections::HashSet;
use std::sync::Arc;

use regindex_registry::ModuleEntry;
use regindex_scraper::{scrape_module_version, ModuleScrape};
use regindex_storage::BufferedStorage;
use regindex_types::{
    ModuleAddr, ModuleDescriptor, ModuleVersionDoc, StoragePath, VersionDescriptor, VersionNumber,
};
use regindex_vcs::VcsRepository;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexerError, Result};
use crate::search_sync;
use crate::store;
use crate::Pipeline;

pub(crate) enum ModuleOutcome {
    Updated(ModuleDescriptor),
    Removed(ModuleAddr),
}

/// Brings one module up to date with its registry entry.
pub(crate) async fn process_module(
    pipeline: Pipeline,
    entry: ModuleEntry,
    blocked: Option<String>,
    cancel: CancellationToken,
) -> Result<ModuleOutcome> {
    let addr = entry.addr.clone();
    let prefix = addr.storage_prefix();
    let entity_storage = pipeline.storage.subdirectory(&prefix)?;

    let mut descriptor = store::read_json::<ModuleDescriptor>(&entity_storage, "index.json")
        .await?
        .unwrap_or_else(|| ModuleDescriptor::new(addr.clone()));
    descriptor.addr = addr.clone();
    descriptor.description = entry.metadata.description.clone();
    descriptor.popularity = entry.metadata.popularity;
    descriptor.fork_of = parse_fork(&entry.metadata.fork_of, &addr);

    // Blocking annotates the entity and shields it from retirement; docs
    // are still generated for every license-permitting version.
    match blocked {
        Some(reason) => {
            log::info!("module {}: blocked: {}", addr.display, reason);
            descriptor.is_blocked = true;
            descriptor.blocked_reason = reason;
        }
        None => {
            descriptor.is_blocked = false;
            descriptor.blocked_reason.clear();
        }
    }

    if entry.versions.is_empty() {
        return retire(&pipeline, &addr, &entity_storage, descriptor, "no versions left").await;
    }

    let url = repository_url(&entry.metadata.repository, &addr);
    let repo = match pipeline.vcs.open(&url, &cancel).await {
        Ok(repo) => repo,
        Err(e) if e.is_repository_not_found() => {
            log::warn!("module {}: repository {} is gone", addr.display, url);
            return retire(&pipeline, &addr, &entity_storage, descriptor, "repository is gone")
                .await;
        }
        Err(e) => return Err(e.into()),
    };

    prune_withdrawn(&entity_storage, &mut descriptor, &entry.versions, &addr).await?;
    scrape_missing(&pipeline, &entry, &addr, repo, &mut descriptor, &cancel).await?;

    if descriptor.versions.is_empty() {
        return retire(
            &pipeline,
            &addr,
            &entity_storage,
            descriptor,
            "every version failed or vanished",
        )
        .await;
    }

    let latest = descriptor.versions[0].id.clone();
    match store::read_json::<ModuleVersionDoc>(&entity_storage, &format!("{}/index.json", latest))
        .await?
    {
        Some(doc) => search_sync::sync_module(&pipeline.meta, &descriptor, &doc)?,
        None => log::warn!(
            "module {}: latest version {} has no stored document, skipping search sync",
            addr.display,
            latest
        ),
    }

    store::write_json(&entity_storage, "index.json", &descriptor).await?;
    Ok(ModuleOutcome::Updated(descriptor))
}

async fn prune_withdrawn(
    entity_storage: &BufferedStorage,
    descriptor: &mut ModuleDescriptor,
    desired: &[VersionNumber],
    addr: &ModuleAddr,
) -> Result<()> {
    let keep: HashSet<String> = desired.iter().map(|v| v.to_string()).collect();
    let stale: Vec<VersionNumber> = descriptor
        .versions
        .iter()
        .filter(|v| !keep.contains(&v.id.to_string()))
        .map(|v| v.id.clone())
        .collect();
    for version in stale {
        log::info!(
            "module {}: version {} withdrawn from the registry, removing",
            addr.display,
            version
        );
        entity_storage
            .remove_all(&StoragePath::new(&version.to_string())?)
            .await?;
        descriptor.remove_version(&version);
    }
    Ok(())
}

async fn scrape_missing(
    pipeline: &Pipeline,
    entry: &ModuleEntry,
    addr: &ModuleAddr,
    repo: Arc<dyn VcsRepository>,
    descriptor: &mut ModuleDescriptor,
    cancel: &CancellationToken,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(pipeline.version_parallelism));
    let mut set: JoinSet<(VersionNumber, Result<VersionDescriptor>)> = JoinSet::new();
    for version in entry.versions.iter().cloned() {
        let wanted = !descriptor.has_version(&version) || pipeline.force.module(addr, &version);
        if !wanted {
            continue;
        }
        let pipeline = pipeline.clone();
        let addr = addr.clone();
        let repo = Arc::clone(&repo);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        set.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            if permit.is_err() || cancel.is_cancelled() {
                return (version, Err(IndexerError::Cancelled));
            }
            let result = scrape_one(&pipeline, &addr, &version, repo.as_ref(), &cancel).await;
            (version, result)
        });
    }

    let entity_storage = pipeline.storage.subdirectory(&addr.storage_prefix())?;
    let mut first_err = None;
    while let Some(joined) = set.join_next().await {
        let (version, result) = match joined {
            Ok(pair) => pair,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => return Err(e.into()),
        };
        match result {
            Ok(published) => descriptor.upsert_version(published),
            Err(IndexerError::Vcs(e)) if e.is_version_not_found() => {
                log::warn!(
                    "module {}: tag for version {} is gone, dropping it",
                    addr.display,
                    version
                );
                entity_storage
                    .remove_all(&StoragePath::new(&version.to_string())?)
                    .await?;
                descriptor.remove_version(&version);
            }
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                    set.abort_all();
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn scrape_one(
    pipeline: &Pipeline,
    addr: &ModuleAddr,
    version: &VersionNumber,
    repo: &dyn VcsRepository,
    cancel: &CancellationToken,
) -> Result<VersionDescriptor> {
    log::debug!("module {}: scraping version {}", addr.display, version);
    let worktree = repo.add_worktree(version, cancel).await?;
    let result = async {
        let published = repo.tag_date(version, cancel).await?;
        let licenses = pipeline
            .detector
            .detect(&worktree, |path| repo.file_view_url(version, path))
            .await?;
        let version_storage = pipeline
            .storage
            .subdirectory(&format!("{}/{}", addr.storage_prefix(), version))?;
        let doc = scrape_module_version(ModuleScrape {
            version,
            published,
            worktree: &worktree,
            repo,
            licenses,
            storage: &version_storage,
            extractor: pipeline.extractor.as_ref(),
            cancel,
        })
        .await?;
        store::write_json(&version_storage, "index.json", &doc).await?;
        Ok(VersionDescriptor {
            id: version.clone(),
            published,
        })
    }
    .await;
    if let Err(e) = repo.remove_worktree(version).await {
        log::warn!(
            "module {}: failed to remove worktree for {}: {}",
            addr.display,
            version,
            e
        );
    }
    result
}

/// Retires an entity that has nothing left to document, unless it is
/// blocked, in which case the record survives with the blocked flag set.
async fn retire(
    pipeline: &Pipeline,
    addr: &ModuleAddr,
    entity_storage: &BufferedStorage,
    descriptor: ModuleDescriptor,
    why: &str,
) -> Result<ModuleOutcome> {
    if descriptor.is_blocked {
        log::info!("module {}: {}, kept because it is blocked", addr.display, why);
        store::write_json(entity_storage, "index.json", &descriptor).await?;
        return Ok(ModuleOutcome::Updated(descriptor));
    }
    log::info!("module {}: {}, retiring", addr.display, why);
    remove_entity(pipeline, addr).await
}

pub(crate) async fn remove_entity(
    pipeline: &Pipeline,
    addr: &ModuleAddr,
) -> Result<ModuleOutcome> {
    pipeline
        .storage
        .remove_all(&StoragePath::new(&addr.storage_prefix())?)
        .await?;
    pipeline.meta.remove_item(&addr.index_id());
    Ok(ModuleOutcome::Removed(addr.clone()))
}

fn parse_fork(fork_of: &str, addr: &ModuleAddr) -> Option<ModuleAddr> {
    if fork_of.is_empty() {
        return None;
    }
    match fork_of.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!(
                "module {}: unparsable fork_of {:?}: {}",
                addr.display,
                fork_of,
                e
            );
            None
        }
    }
}

fn repository_url(configured: &str, addr: &ModuleAddr) -> String {
    if configured.is_empty() {
        format!(
            "https://github.com/{}/terraform-{}-{}",
            addr.namespace, addr.target_system, addr.name
        )
    } else {
        configured.to_string()
    }
}
