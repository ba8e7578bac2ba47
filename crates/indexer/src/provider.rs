//! Per-provider generation: version reconciliation, scraping and search
//! synchronization for one provider entity.

use std::collections::HashSet;
use std::sync::Arc;

use regindex_registry::ProviderEntry;
use regindex_scraper::{scrape_provider_version, ProviderScrape};
use regindex_storage::BufferedStorage;
use regindex_types::{
    ProviderAddr, ProviderDescriptor, ProviderVersionDoc, StoragePath, VersionDescriptor,
    VersionNumber,
};
use regindex_vcs::VcsRepository;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexerError, Result};
use crate::search_sync;
use crate::store;
use crate::Pipeline;

pub(crate) enum ProviderOutcome {
    Updated(ProviderDescriptor),
    Removed(ProviderAddr),
}

/// Brings one provider up to date with its registry entry.
///
/// Missing versions are scraped, withdrawn versions pruned, and the entity
/// retired entirely when its repository is gone or no version remains.
/// Returns an error only for failures that must abort the whole run.
pub(crate) async fn process_provider(
    pipeline: Pipeline,
    entry: ProviderEntry,
    canonical: ProviderAddr,
    blocked: Option<String>,
    cancel: CancellationToken,
) -> Result<ProviderOutcome> {
    let addr = entry.addr.clone();
    let prefix = addr.storage_prefix();
    let entity_storage = pipeline.storage.subdirectory(&prefix)?;

    let mut descriptor = store::read_json::<ProviderDescriptor>(&entity_storage, "index.json")
        .await?
        .unwrap_or_else(|| ProviderDescriptor::new(addr.clone()));
    descriptor.addr = addr.clone();
    descriptor.description = entry.metadata.description.clone();
    descriptor.popularity = entry.metadata.popularity;
    descriptor.fork_of = parse_fork(&entry.metadata.fork_of, &addr);
    if canonical != addr {
        descriptor.alias_of = Some(canonical.clone());
        descriptor.canonical_addr = Some(canonical.clone());
    } else {
        descriptor.alias_of = None;
        descriptor.canonical_addr = None;
    }

    // Blocking annotates the entity and shields it from retirement; docs
    // are still generated for every license-permitting version.
    match blocked {
        Some(reason) => {
            log::info!("provider {}: blocked: {}", addr.display, reason);
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

    let url = repository_url(&entry.metadata.repository, &canonical);
    let repo = match pipeline.vcs.open(&url, &cancel).await {
        Ok(repo) => repo,
        Err(e) if e.is_repository_not_found() => {
            log::warn!("provider {}: repository {} is gone", addr.display, url);
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
    match store::read_json::<ProviderVersionDoc>(
        &entity_storage,
        &format!("{}/index.json", latest),
    )
    .await?
    {
        Some(doc) => search_sync::sync_provider(&pipeline.meta, &descriptor, &doc)?,
        None => log::warn!(
            "provider {}: latest version {} has no stored document, skipping search sync",
            addr.display,
            latest
        ),
    }

    store::write_json(&entity_storage, "index.json", &descriptor).await?;
    Ok(ProviderOutcome::Updated(descriptor))
}

/// Removes version subtrees that the registry no longer lists.
async fn prune_withdrawn(
    entity_storage: &BufferedStorage,
    descriptor: &mut ProviderDescriptor,
    desired: &[VersionNumber],
    addr: &ProviderAddr,
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
            "provider {}: version {} withdrawn from the registry, removing",
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

/// Scrapes every version the descriptor is missing, or that a force
/// selector marks stale, with bounded parallelism. Versions whose tag has
/// disappeared are dropped; any other failure aborts the entity.
async fn scrape_missing(
    pipeline: &Pipeline,
    entry: &ProviderEntry,
    addr: &ProviderAddr,
    repo: Arc<dyn VcsRepository>,
    descriptor: &mut ProviderDescriptor,
    cancel: &CancellationToken,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(pipeline.version_parallelism));
    let mut set: JoinSet<(VersionNumber, Result<VersionDescriptor>)> = JoinSet::new();
    for version in entry.versions.iter().cloned() {
        let wanted =
            !descriptor.has_version(&version) || pipeline.force.provider(addr, &version);
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
                    "provider {}: tag for version {} is gone, dropping it",
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
    addr: &ProviderAddr,
    version: &VersionNumber,
    repo: &dyn VcsRepository,
    cancel: &CancellationToken,
) -> Result<VersionDescriptor> {
    log::debug!("provider {}: scraping version {}", addr.display, version);
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
        let doc = scrape_provider_version(ProviderScrape {
            version,
            published,
            worktree: &worktree,
            repo,
            licenses,
            storage: &version_storage,
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
            "provider {}: failed to remove worktree for {}: {}",
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
    addr: &ProviderAddr,
    entity_storage: &BufferedStorage,
    descriptor: ProviderDescriptor,
    why: &str,
) -> Result<ProviderOutcome> {
    if descriptor.is_blocked {
        log::info!("provider {}: {}, kept because it is blocked", addr.display, why);
        store::write_json(entity_storage, "index.json", &descriptor).await?;
        return Ok(ProviderOutcome::Updated(descriptor));
    }
    log::info!("provider {}: {}, retiring", addr.display, why);
    remove_entity(pipeline, addr).await
}

pub(crate) async fn remove_entity(
    pipeline: &Pipeline,
    addr: &ProviderAddr,
) -> Result<ProviderOutcome> {
    pipeline
        .storage
        .remove_all(&StoragePath::new(&addr.storage_prefix())?)
        .await?;
    pipeline.meta.remove_item(&addr.index_id());
    Ok(ProviderOutcome::Removed(addr.clone()))
}

fn parse_fork(fork_of: &str, addr: &ProviderAddr) -> Option<ProviderAddr> {
    if fork_of.is_empty() {
        return None;
    }
    match fork_of.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!(
                "provider {}: unparsable fork_of {:?}: {}",
                addr.display,
                fork_of,
                e
            );
            None
        }
    }
}

fn repository_url(configured: &str, canonical: &ProviderAddr) -> String {
    if configured.is_empty() {
        format!(
            "https://github.com/{}/terraform-provider-{}",
            canonical.namespace, canonical.name
        )
    } else {
        configured.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repository_url_falls_back_to_the_canonical_addr() {
        let canonical = ProviderAddr::new("acme", "foo").unwrap();
        assert_eq!(
            repository_url("", &canonical),
            "https://github.com/acme/terraform-provider-foo"
        );
        assert_eq!(
            repository_url("https://gitlab.com/acme/x", &canonical),
            "https://gitlab.com/acme/x"
        );
    }

    #[test]
    fn fork_of_parses_or_warns() {
        let addr = ProviderAddr::new("acme", "foo").unwrap();
        assert_eq!(parse_fork("", &addr), None);
        assert_eq!(parse_fork("not an addr", &addr), None);
        assert_eq!(
            parse_fork("upstream/foo", &addr),
            Some(ProviderAddr::new("upstream", "foo").unwrap())
        );
    }
}
