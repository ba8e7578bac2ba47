//! # Regindex Indexer
//!
//! The generation orchestrator: reconciles the registry metadata with the
//! stored documentation tree, scraping what is missing, pruning what was
//! withdrawn, and keeping the search change log in step. All writes go
//! through one buffered storage transaction that commits at the end of a
//! successful run and rolls back otherwise.

mod error;
mod module;
mod options;
mod provider;
mod search_sync;
mod store;

pub use error::{IndexerError, Result};
pub use options::{
    BlockList, FileBlockList, ForceRegenerate, GenerateOptions, NeverRegenerate, NoBlockList,
    SelectorRegenerate,
};

use std::path::Path;
use std::sync::Arc;

use regindex_license::{KeywordMatcher, LicenseDetector};
use regindex_registry::RegistrySource;
use regindex_scraper::SchemaExtractor;
use regindex_search::{load_meta_index, store_meta_index, MetaIndex};
use regindex_storage::BufferedStorage;
use regindex_types::{
    ModuleAddr, ModuleDescriptor, ModuleList, ProviderAddr, ProviderDescriptor, ProviderList,
    ProviderVersionDoc, StoragePath, VersionNumber,
};
use regindex_vcs::VcsClient;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use module::ModuleOutcome;
use provider::ProviderOutcome;

const PROVIDER_LIST_KEY: &str = "providers/index.json";
const MODULE_LIST_KEY: &str = "modules/index.json";
const OPENAPI_KEY: &str = "openapi.yml";
const LANDING_KEY: &str = "index.html";
const ROOT_INDEX_KEY: &str = "index.json";

const DEFAULT_ENTITY_PARALLELISM: usize = 25;
const DEFAULT_VERSION_PARALLELISM: usize = 10;

static OPENAPI_DOC: &str = include_str!("../assets/openapi.yml");
static LANDING_PAGE: &str = include_str!("../assets/index.html");

/// Shared services handed to every entity task.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub storage: BufferedStorage,
    pub vcs: Arc<dyn VcsClient>,
    pub detector: Arc<LicenseDetector>,
    pub extractor: Arc<SchemaExtractor>,
    pub meta: Arc<MetaIndex>,
    pub force: Arc<dyn ForceRegenerate>,
    pub version_parallelism: usize,
}

/// Counters reported after a generation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub providers_updated: usize,
    pub providers_removed: usize,
    pub modules_updated: usize,
    pub modules_removed: usize,
}

pub struct Indexer {
    storage: BufferedStorage,
    vcs: Arc<dyn VcsClient>,
    detector: Arc<LicenseDetector>,
    extractor: Arc<SchemaExtractor>,
    entity_parallelism: usize,
    version_parallelism: usize,
}

impl Indexer {
    pub fn new(storage: BufferedStorage, vcs: Arc<dyn VcsClient>) -> Self {
        Self {
            storage,
            vcs,
            detector: Arc::new(LicenseDetector::new(Arc::new(KeywordMatcher))),
            extractor: Arc::new(SchemaExtractor::new("tofu")),
            entity_parallelism: DEFAULT_ENTITY_PARALLELISM,
            version_parallelism: DEFAULT_VERSION_PARALLELISM,
        }
    }

    pub fn with_license_detector(mut self, detector: LicenseDetector) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    pub fn with_schema_extractor(mut self, extractor: SchemaExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Bounds on concurrent entities and, within one entity, concurrent
    /// versions.
    pub fn with_parallelism(mut self, entities: usize, versions: usize) -> Self {
        self.entity_parallelism = entities.max(1);
        self.version_parallelism = versions.max(1);
        self
    }

    /// Runs one full generation pass against the registry tree at
    /// `registry_root` and commits the result. Any failure rolls the staged
    /// state back and surfaces the original error.
    pub async fn generate(
        &self,
        registry_root: &Path,
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerateSummary> {
        options.validate()?;

        let (recovered, registry) = tokio::join!(
            self.storage.recover(cancel),
            RegistrySource::open(registry_root)
        );
        recovered?;
        let registry = registry?;

        match self.run(&registry, options, cancel).await {
            Ok(summary) => {
                log::info!(
                    "generation finished: {} providers updated, {} removed, {} modules updated, {} removed",
                    summary.providers_updated,
                    summary.providers_removed,
                    summary.modules_updated,
                    summary.modules_removed
                );
                self.storage.commit(cancel).await?;
                Ok(summary)
            }
            Err(e) => {
                if let Err(rb) = self.storage.rollback().await {
                    log::error!("rollback after a failed run also failed: {rb}");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        registry: &RegistrySource,
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerateSummary> {
        let meta = Arc::new(load_meta_index(&self.storage).await?);
        let pipeline = Pipeline {
            storage: self.storage.clone(),
            vcs: Arc::clone(&self.vcs),
            detector: Arc::clone(&self.detector),
            extractor: Arc::clone(&self.extractor),
            meta: Arc::clone(&meta),
            force: Arc::clone(&options.force),
            version_parallelism: self.version_parallelism,
        };

        let mut summary = GenerateSummary::default();
        if !options.skip_providers {
            self.run_providers(registry, options, &pipeline, &mut summary, cancel)
                .await?;
        }
        if !options.skip_modules {
            self.run_modules(registry, options, &pipeline, &mut summary, cancel)
                .await?;
        }
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        store_meta_index(&self.storage, &meta).await?;
        self.storage
            .write(&StoragePath::new(OPENAPI_KEY)?, OPENAPI_DOC.as_bytes())
            .await?;
        self.storage
            .write(&StoragePath::new(LANDING_KEY)?, LANDING_PAGE.as_bytes())
            .await?;
        self.write_root_index().await?;
        Ok(summary)
    }

    /// Writes the top-level `index.json` pointing consumers at the listing,
    /// search and OpenAPI documents.
    async fn write_root_index(&self) -> Result<()> {
        let root = serde_json::json!({
            "providers": PROVIDER_LIST_KEY,
            "modules": MODULE_LIST_KEY,
            "search": regindex_search::STREAM_KEY,
            "openapi": OPENAPI_KEY,
        });
        self.storage
            .write(
                &StoragePath::new(ROOT_INDEX_KEY)?,
                &serde_json::to_vec_pretty(&root)?,
            )
            .await?;
        Ok(())
    }

    async fn run_providers(
        &self,
        registry: &RegistrySource,
        options: &GenerateOptions,
        pipeline: &Pipeline,
        summary: &mut GenerateSummary,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let entries = registry.list_providers(&options.namespace).await?;
        log::info!("updating {} providers", entries.len());

        let mut list: ProviderList = store::read_json(&self.storage, PROVIDER_LIST_KEY)
            .await?
            .unwrap_or_default();

        let semaphore = Arc::new(Semaphore::new(self.entity_parallelism));
        let mut set: JoinSet<Result<ProviderOutcome>> = JoinSet::new();
        for entry in entries {
            let canonical = registry.canonical_provider_addr(&entry.addr);
            let blocked = blocked_reason(
                entry.metadata.blocked,
                &entry.metadata.blocked_reason,
                options.blocklist.provider_blocked(&entry.addr),
            );
            let pipeline = pipeline.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| IndexerError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(IndexerError::Cancelled);
                }
                provider::process_provider(pipeline, entry, canonical, blocked, cancel).await
            });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(ProviderOutcome::Updated(descriptor))) => {
                    list.upsert(descriptor);
                    summary.providers_updated += 1;
                }
                Ok(Ok(ProviderOutcome::Removed(addr))) => {
                    list.remove(&addr);
                    summary.providers_removed += 1;
                }
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                        set.abort_all();
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        store::write_json(&self.storage, PROVIDER_LIST_KEY, &list).await?;
        Ok(())
    }

    async fn run_modules(
        &self,
        registry: &RegistrySource,
        options: &GenerateOptions,
        pipeline: &Pipeline,
        summary: &mut GenerateSummary,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let entries = registry.list_modules(&options.namespace).await?;
        log::info!("updating {} modules", entries.len());

        let mut list: ModuleList = store::read_json(&self.storage, MODULE_LIST_KEY)
            .await?
            .unwrap_or_default();

        let semaphore = Arc::new(Semaphore::new(self.entity_parallelism));
        let mut set: JoinSet<Result<ModuleOutcome>> = JoinSet::new();
        for entry in entries {
            let blocked = blocked_reason(
                entry.metadata.blocked,
                &entry.metadata.blocked_reason,
                options.blocklist.module_blocked(&entry.addr),
            );
            let pipeline = pipeline.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| IndexerError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(IndexerError::Cancelled);
                }
                module::process_module(pipeline, entry, blocked, cancel).await
            });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(ModuleOutcome::Updated(descriptor))) => {
                    list.upsert(descriptor);
                    summary.modules_updated += 1;
                }
                Ok(Ok(ModuleOutcome::Removed(addr))) => {
                    list.remove(&addr);
                    summary.modules_removed += 1;
                }
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                        set.abort_all();
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        store::write_json(&self.storage, MODULE_LIST_KEY, &list).await?;
        Ok(())
    }

    /// Removes one provider, or a single version of it, from the stored
    /// tree, the listing and the search index, then commits.
    pub async fn remove_provider(
        &self,
        addr: &ProviderAddr,
        version: Option<&VersionNumber>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.storage.recover(cancel).await?;
        let meta = Arc::new(load_meta_index(&self.storage).await?);

        let mut list: ProviderList = store::read_json(&self.storage, PROVIDER_LIST_KEY)
            .await?
            .unwrap_or_default();
        let entity_storage = self.storage.subdirectory(&addr.storage_prefix())?;

        let remove_whole = match version {
            Some(version) => {
                let descriptor =
                    store::read_json::<ProviderDescriptor>(&entity_storage, "index.json").await?;
                match descriptor {
                    Some(mut descriptor) => {
                        entity_storage
                            .remove_all(&StoragePath::new(&version.to_string())?)
                            .await?;
                        descriptor.remove_version(version);
                        if descriptor.versions.is_empty() {
                            true
                        } else {
                            let latest = descriptor.versions[0].id.clone();
                            if let Some(doc) = store::read_json::<ProviderVersionDoc>(
                                &entity_storage,
                                &format!("{}/index.json", latest),
                            )
                            .await?
                            {
                                search_sync::sync_provider(&meta, &descriptor, &doc)?;
                            }
                            store::write_json(&entity_storage, "index.json", &descriptor).await?;
                            list.upsert(descriptor);
                            false
                        }
                    }
                    None => true,
                }
            }
            None => true,
        };

        if remove_whole {
            log::info!("removing provider {}", addr.display);
            self.storage
                .remove_all(&StoragePath::new(&addr.storage_prefix())?)
                .await?;
            meta.remove_item(&addr.index_id());
            list.remove(addr);
        }

        store::write_json(&self.storage, PROVIDER_LIST_KEY, &list).await?;
        store_meta_index(&self.storage, &meta).await?;
        self.storage.commit(cancel).await?;
        Ok(())
    }

    /// Removes one module, or a single version of it. Mirrors
    /// [`Indexer::remove_provider`].
    pub async fn remove_module(
        &self,
        addr: &ModuleAddr,
        version: Option<&VersionNumber>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.storage.recover(cancel).await?;
        let meta = Arc::new(load_meta_index(&self.storage).await?);

        let mut list: ModuleList = store::read_json(&self.storage, MODULE_LIST_KEY)
            .await?
            .unwrap_or_default();
        let entity_storage = self.storage.subdirectory(&addr.storage_prefix())?;

        let remove_whole = match version {
            Some(version) => {
                let descriptor =
                    store::read_json::<ModuleDescriptor>(&entity_storage, "index.json").await?;
                match descriptor {
                    Some(mut descriptor) => {
                        entity_storage
                            .remove_all(&StoragePath::new(&version.to_string())?)
                            .await?;
                        descriptor.remove_version(version);
                        if descriptor.versions.is_empty() {
                            true
                        } else {
                            let latest = descriptor.versions[0].id.clone();
                            if let Some(doc) = store::read_json::<
                                regindex_types::ModuleVersionDoc,
                            >(
                                &entity_storage, &format!("{}/index.json", latest)
                            )
                            .await?
                            {
                                search_sync::sync_module(&meta, &descriptor, &doc)?;
                            }
                            store::write_json(&entity_storage, "index.json", &descriptor).await?;
                            list.upsert(descriptor);
                            false
                        }
                    }
                    None => true,
                }
            }
            None => true,
        };

        if remove_whole {
            log::info!("removing module {}", addr.display);
            self.storage
                .remove_all(&StoragePath::new(&addr.storage_prefix())?)
                .await?;
            meta.remove_item(&addr.index_id());
            list.remove(addr);
        }

        store::write_json(&self.storage, MODULE_LIST_KEY, &list).await?;
        store_meta_index(&self.storage, &meta).await?;
        self.storage.commit(cancel).await?;
        Ok(())
    }
}

fn blocked_reason(
    metadata_blocked: bool,
    metadata_reason: &str,
    policy: Option<String>,
) -> Option<String> {
    if metadata_blocked {
        let reason = if metadata_reason.is_empty() {
            "blocked by the registry".to_string()
        } else {
            metadata_reason.to_string()
        };
        return Some(reason);
    }
    policy
}
