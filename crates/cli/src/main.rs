//! Command line entry point for the registry documentation indexer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use regindex_indexer::{
    FileBlockList, GenerateOptions, Indexer, NeverRegenerate, NoBlockList, SelectorRegenerate,
};
use regindex_registry::Filter;
use regindex_scraper::SchemaExtractor;
use regindex_storage::{BufferedStorage, LocalBackend, S3Backend, S3Settings, Storage};
use regindex_types::{
    ModuleAddr, ModuleDescriptor, ProviderAddr, ProviderDescriptor, StoragePath, VersionNumber,
};
use regindex_vcs::GitCli;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "regindex",
    version,
    about = "Generates registry documentation trees and search indexes"
)]
struct Cli {
    /// Log verbosity.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a full generation pass against a registry metadata tree.
    Generate(GenerateArgs),
    /// Remove an entity, or one of its versions, from the generated tree.
    Remove(RemoveArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Skip regenerating providers.
    #[arg(long)]
    skip_update_providers: bool,

    /// Skip regenerating modules.
    #[arg(long)]
    skip_update_modules: bool,

    /// Restrict the run to one namespace, or an address pattern with a
    /// single `*` wildcard per segment.
    #[arg(long, default_value = "")]
    namespace: String,

    /// Path to a clone of the registry metadata repository.
    #[arg(long)]
    registry_dir: PathBuf,

    /// Directory holding repository clones and worktrees.
    #[arg(long, default_value = "regindex-vcs")]
    vcs_dir: PathBuf,

    /// Staging directory for the storage write buffer; keep it stable
    /// across runs so interrupted commits can resume.
    #[arg(long, default_value = "regindex-buffer")]
    buffer_dir: PathBuf,

    /// Write the generated tree to a local directory instead of S3.
    #[arg(long, conflicts_with = "s3_bucket")]
    destination_dir: Option<PathBuf>,

    #[arg(long, env = "AWS_S3_BUCKET")]
    s3_bucket: Option<String>,

    #[arg(long, env = "AWS_ENDPOINT_URL_S3")]
    s3_endpoint: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    s3_region: Option<String>,

    /// Use path-style S3 addressing (needed by most S3-compatible stores).
    #[arg(long)]
    s3_path_style: bool,

    /// Extra CA certificate bundle for the S3 endpoint.
    #[arg(long, env = "AWS_CA_BUNDLE")]
    s3_ca_cert_file: Option<PathBuf>,

    /// Maximum concurrently processed entities; also the upload pool size.
    #[arg(long, default_value_t = 25)]
    parallelism: usize,

    /// Maximum concurrently scraped versions per entity.
    #[arg(long, default_value_t = 10)]
    version_parallelism: usize,

    /// Binary invoked for module schema extraction.
    #[arg(long, default_value = "tofu")]
    tofu_binary_path: PathBuf,

    /// JSON file of entities to block, with reasons.
    #[arg(long)]
    blocklist_file: Option<PathBuf>,

    /// Text file of `addr[@version]` selectors to regenerate even when
    /// already indexed.
    #[arg(long)]
    force_regenerate_file: Option<PathBuf>,
}

#[derive(Args)]
struct RemoveArgs {
    /// Kind of entity to remove.
    #[arg(value_enum)]
    resource_type: ResourceType,

    /// Entity address: `namespace/name` for providers,
    /// `namespace/name/target` for modules.
    addr: String,

    /// Remove only this version instead of the whole entity.
    #[arg(long)]
    version: Option<String>,

    /// Actually perform the removal.
    #[arg(long)]
    force: bool,

    /// Describe what would be removed without touching storage.
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    destination: DestinationArgs,
}

#[derive(Args)]
struct DestinationArgs {
    #[arg(long, default_value = "regindex-buffer")]
    buffer_dir: PathBuf,

    #[arg(long, conflicts_with = "s3_bucket")]
    destination_dir: Option<PathBuf>,

    #[arg(long, env = "AWS_S3_BUCKET")]
    s3_bucket: Option<String>,

    #[arg(long, env = "AWS_ENDPOINT_URL_S3")]
    s3_endpoint: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    s3_region: Option<String>,

    #[arg(long)]
    s3_path_style: bool,

    #[arg(long, env = "AWS_CA_BUNDLE")]
    s3_ca_cert_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResourceType {
    Provider,
    Module,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level.into())
        .init();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, finishing up");
            signal_cancel.cancel();
        }
    });

    match cli.command {
        Command::Generate(args) => generate(args, &cancel).await,
        Command::Remove(args) => remove(args, &cancel).await,
    }
}

async fn generate(args: GenerateArgs, cancel: &CancellationToken) -> Result<()> {
    validate_namespace(&args.namespace)?;

    let storage = open_storage(
        &args.buffer_dir,
        args.destination_dir.clone(),
        args.s3_bucket.clone(),
        args.s3_endpoint.clone(),
        args.s3_region.clone(),
        args.s3_path_style,
        args.s3_ca_cert_file.clone(),
        args.parallelism,
    )
    .await?;

    let vcs = Arc::new(GitCli::new(&args.vcs_dir));
    let indexer = Indexer::new(storage, vcs)
        .with_schema_extractor(SchemaExtractor::new(&args.tofu_binary_path))
        .with_parallelism(args.parallelism, args.version_parallelism);

    let mut options = GenerateOptions {
        namespace: Filter::parse(&args.namespace),
        skip_providers: args.skip_update_providers,
        skip_modules: args.skip_update_modules,
        force: Arc::new(NeverRegenerate),
        blocklist: Arc::new(NoBlockList),
    };
    if let Some(path) = &args.blocklist_file {
        options.blocklist = Arc::new(
            FileBlockList::load(path)
                .await
                .with_context(|| format!("loading blocklist {}", path.display()))?,
        );
    }
    if let Some(path) = &args.force_regenerate_file {
        options.force = Arc::new(
            SelectorRegenerate::load(path)
                .await
                .with_context(|| format!("loading force selectors {}", path.display()))?,
        );
    }

    let summary = indexer
        .generate(&args.registry_dir, &options, cancel)
        .await
        .context("generation failed")?;
    log::info!(
        "done: {}+{} providers, {}+{} modules (updated+removed)",
        summary.providers_updated,
        summary.providers_removed,
        summary.modules_updated,
        summary.modules_removed
    );
    Ok(())
}

async fn remove(args: RemoveArgs, cancel: &CancellationToken) -> Result<()> {
    let version = args
        .version
        .as_deref()
        .map(VersionNumber::parse)
        .transpose()
        .context("invalid --version")?;
    let scope = match &version {
        Some(v) => format!("version {v} of"),
        None => "all versions of".to_string(),
    };

    if !args.dry_run && !args.force {
        bail!("refusing to remove without --force (use --dry-run to preview)");
    }

    let d = &args.destination;
    let storage = open_storage(
        &d.buffer_dir,
        d.destination_dir.clone(),
        d.s3_bucket.clone(),
        d.s3_endpoint.clone(),
        d.s3_region.clone(),
        d.s3_path_style,
        d.s3_ca_cert_file.clone(),
        25,
    )
    .await?;

    if args.dry_run {
        return preview_removal(&storage, args.resource_type, &args.addr, version.as_ref()).await;
    }

    // Removal never touches repositories; the VCS working dir stays unused.
    let vcs = Arc::new(GitCli::new("regindex-vcs"));
    let indexer = Indexer::new(storage, vcs);

    match args.resource_type {
        ResourceType::Provider => {
            let addr: ProviderAddr = args.addr.parse().context("invalid provider address")?;
            indexer
                .remove_provider(&addr, version.as_ref(), cancel)
                .await?;
        }
        ResourceType::Module => {
            let addr: ModuleAddr = args.addr.parse().context("invalid module address")?;
            indexer
                .remove_module(&addr, version.as_ref(), cancel)
                .await?;
        }
    }
    log::info!(
        "removed {} {} {}",
        scope,
        resource_name(args.resource_type),
        args.addr
    );
    Ok(())
}

/// Resolves the entity from the generated tree and lists what a real
/// removal would delete. A missing entity or version is an error.
async fn preview_removal(
    storage: &BufferedStorage,
    kind: ResourceType,
    addr: &str,
    version: Option<&VersionNumber>,
) -> Result<()> {
    let (display, versions) = match kind {
        ResourceType::Provider => {
            let addr: ProviderAddr = addr.parse().context("invalid provider address")?;
            let descriptor: ProviderDescriptor =
                read_descriptor(storage, &addr.storage_prefix())
                    .await?
                    .with_context(|| {
                        format!("provider {} is not in the generated tree", addr.display)
                    })?;
            let ids: Vec<VersionNumber> =
                descriptor.versions.iter().map(|v| v.id.clone()).collect();
            (descriptor.addr.display.clone(), ids)
        }
        ResourceType::Module => {
            let addr: ModuleAddr = addr.parse().context("invalid module address")?;
            let descriptor: ModuleDescriptor = read_descriptor(storage, &addr.storage_prefix())
                .await?
                .with_context(|| {
                    format!("module {} is not in the generated tree", addr.display)
                })?;
            let ids: Vec<VersionNumber> =
                descriptor.versions.iter().map(|v| v.id.clone()).collect();
            (descriptor.addr.display.clone(), ids)
        }
    };
    match version {
        Some(v) => {
            if !versions.iter().any(|id| id == v) {
                bail!("{} {} has no version {}", resource_name(kind), display, v);
            }
            log::info!(
                "dry run: would remove version {} of {} {}",
                v,
                resource_name(kind),
                display
            );
        }
        None => {
            log::info!(
                "dry run: would remove {} {} and its {} version(s)",
                resource_name(kind),
                display,
                versions.len()
            );
            for id in &versions {
                log::info!("  {}", id);
            }
        }
    }
    Ok(())
}

async fn read_descriptor<T: serde::de::DeserializeOwned>(
    storage: &BufferedStorage,
    prefix: &str,
) -> Result<Option<T>> {
    let path = StoragePath::new(&format!("{prefix}/index.json"))?;
    match storage.read(&path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn resource_name(kind: ResourceType) -> &'static str {
    match kind {
        ResourceType::Provider => "provider",
        ResourceType::Module => "module",
    }
}

#[allow(clippy::too_many_arguments)]
async fn open_storage(
    buffer_dir: &std::path::Path,
    destination_dir: Option<PathBuf>,
    s3_bucket: Option<String>,
    s3_endpoint: Option<String>,
    s3_region: Option<String>,
    s3_path_style: bool,
    s3_ca_cert_file: Option<PathBuf>,
    parallelism: usize,
) -> Result<BufferedStorage> {
    let backing = match (destination_dir, s3_bucket) {
        (Some(dir), None) => Storage::new(Arc::new(LocalBackend::new(dir))),
        (None, Some(bucket)) => {
            if let Some(bundle) = s3_ca_cert_file {
                // The TLS stack picks the bundle up from the environment.
                std::env::set_var("SSL_CERT_FILE", &bundle);
            }
            let backend = S3Backend::connect(S3Settings {
                bucket,
                endpoint: s3_endpoint.unwrap_or_default(),
                region: s3_region.unwrap_or_default(),
                path_style: s3_path_style,
            })
            .await
            .context("connecting to S3")?;
            Storage::new(Arc::new(backend))
        }
        (None, None) => bail!("either --destination-dir or --s3-bucket is required"),
        (Some(_), Some(_)) => bail!("--destination-dir and --s3-bucket are mutually exclusive"),
    };
    Ok(BufferedStorage::new(backing, buffer_dir, Some(parallelism)).await?)
}

fn validate_namespace(namespace: &str) -> Result<()> {
    let ok = namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '*'));
    if !ok {
        bail!("invalid --namespace {:?}", namespace);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn namespace_validation() {
        assert!(validate_namespace("").is_ok());
        assert!(validate_namespace("acme").is_ok());
        assert!(validate_namespace("acme/widget-*").is_ok());
        assert!(validate_namespace("acme corp").is_err());
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "regindex",
            "generate",
            "--registry-dir",
            "/tmp/registry",
            "--destination-dir",
            "/tmp/out",
            "--namespace",
            "acme",
            "--parallelism",
            "4",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.namespace, "acme");
                assert_eq!(args.parallelism, 4);
                assert!(!args.skip_update_providers);
            }
            _ => panic!("expected generate"),
        }
    }

    #[tokio::test]
    async fn dry_run_resolves_the_entity_before_reporting() {
        use regindex_types::VersionDescriptor;

        let dir = tempfile::tempdir().unwrap();
        let backing = Storage::new(Arc::new(LocalBackend::new(dir.path().join("backing"))));
        let storage = BufferedStorage::new(backing, dir.path().join("staging"), None)
            .await
            .unwrap();

        let addr = ProviderAddr::new("acme", "foo").unwrap();
        let mut descriptor = ProviderDescriptor::new(addr.clone());
        descriptor.versions.push(VersionDescriptor {
            id: VersionNumber::parse("1.0.0").unwrap(),
            published: chrono::Utc::now(),
        });
        let path = StoragePath::new("providers/acme/foo/index.json").unwrap();
        storage
            .write(&path, &serde_json::to_vec_pretty(&descriptor).unwrap())
            .await
            .unwrap();

        let listed = VersionNumber::parse("1.0.0").unwrap();
        let missing = VersionNumber::parse("9.9.9").unwrap();
        assert!(
            preview_removal(&storage, ResourceType::Provider, "acme/foo", None)
                .await
                .is_ok()
        );
        assert!(
            preview_removal(&storage, ResourceType::Provider, "acme/foo", Some(&listed))
                .await
                .is_ok()
        );
        assert!(
            preview_removal(&storage, ResourceType::Provider, "acme/foo", Some(&missing))
                .await
                .is_err()
        );
        assert!(
            preview_removal(&storage, ResourceType::Provider, "acme/bar", None)
                .await
                .is_err()
        );
    }

    #[test]
    fn remove_requires_positional_addr() {
        let cli = Cli::try_parse_from([
            "regindex",
            "remove",
            "provider",
            "acme/foo",
            "--version",
            "1.2.3",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Remove(args) => {
                assert_eq!(args.addr, "acme/foo");
                assert_eq!(args.version.as_deref(), Some("1.2.3"));
                assert!(args.dry_run);
            }
            _ => panic!("expected remove"),
        }
    }
}
