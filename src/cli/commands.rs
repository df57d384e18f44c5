//! Command handlers for the AstroVision Sync CLI
//!
//! Each handler turns parsed arguments plus the loaded [`AppConfig`] into the
//! collaborators a pipeline needs, runs it and reports the outcome.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::app::{
    hash_file, resolve, CatalogStore, ContentVerifier, DropboxClient, FailureMode, FetchPipeline,
    FetchSettings, Fetcher, HubClient, ManifestStore, PublishPipeline, PublishSettings, Publisher,
    RunSummary, SelectionFilter,
};
use crate::auth::{clear_stored_token, setup_token, show_auth_status};
use crate::cli::progress::format_bytes;
use crate::cli::{
    AuthAction, AuthArgs, FetchArgs, HashArgs, ListArgs, ProgressConfig, ProgressDisplay,
    PublishArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Number of items shown in a dry-run listing before it is abbreviated
const DRY_RUN_PREVIEW: usize = 20;

/// Handle the fetch command
///
/// Loads the partition catalog, resolves the selection and downloads,
/// verifies and unpacks every matching archive.
pub async fn handle_fetch(args: FetchArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let catalog = CatalogStore::new(&config.paths.catalog_dir)
        .load(args.partition)
        .await?;

    let filter = args.filter();
    if args.dry_run {
        return show_dry_run(&catalog, &filter, args.local_dir.as_deref(), config);
    }

    let hub = HubClient::new(config.hub_location(), &config.client_config())?;
    let fetcher = Fetcher::new(Arc::new(hub), config.fetch_options());

    let mut settings = FetchSettings::new(
        args.local_dir
            .clone()
            .unwrap_or_else(|| config.paths.data_root.clone()),
    );
    settings.unpack = !args.unpack_off;
    settings.keep_archives = config.transfer.keep_archives;
    settings.failure_mode = FailureMode::from_keep_going(args.keep_going);
    info!(
        "Fetching from the {} catalog into {}",
        args.partition,
        settings.local_root.display()
    );

    let mut pipeline = FetchPipeline::new(fetcher, settings)
        .with_progress(Arc::new(ProgressDisplay::new(ProgressConfig::for_quiet(quiet))));

    if config.transfer.verify && !args.no_verify {
        pipeline = pipeline.with_verifier(load_verifier(config).await?);
    }

    let summary = pipeline.run(&catalog, &filter).await?;
    report(&summary, quiet);
    summary.into_result().map(|_| ())
}

async fn load_verifier(config: &AppConfig) -> Result<ContentVerifier> {
    let store = ManifestStore::new(config.manifest_path());
    let manifest = if config.transfer.require_manifest_entry {
        store.load().await?
    } else {
        store.load_or_default().await?
    };
    debug!(
        "Loaded {} checksums from {}",
        manifest.len(),
        store.path().display()
    );

    let verifier = ContentVerifier::new(manifest);
    Ok(if config.transfer.require_manifest_entry {
        verifier
    } else {
        verifier.lenient()
    })
}

fn show_dry_run(
    catalog: &crate::app::Catalog,
    filter: &SelectionFilter,
    local_dir: Option<&Path>,
    config: &AppConfig,
) -> Result<()> {
    let items = resolve(catalog, filter)?;
    let root = local_dir.unwrap_or(config.paths.data_root.as_path());

    println!("Dry run - would fetch {} archives:", items.len());
    for (i, item) in items.iter().take(DRY_RUN_PREVIEW).enumerate() {
        println!(
            "  {}. {} -> {}",
            i + 1,
            item.remote_locator,
            item.local_destination(root).display()
        );
    }
    if items.len() > DRY_RUN_PREVIEW {
        println!("  ... and {} more", items.len() - DRY_RUN_PREVIEW);
    }
    Ok(())
}

/// Handle the publish command
///
/// Packages each subdirectory of the local directory, uploads it and records
/// its checksum in the manifest.
pub async fn handle_publish(args: PublishArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    if !args.local_dir.is_dir() {
        return Err(AppError::generic(format!(
            "Local directory {} does not exist",
            args.local_dir.display()
        )));
    }

    let http = config.client_config().build_http_client()?;
    let sink = DropboxClient::from_env_with_url(http, &config.storage.content_url)?;
    let publisher =
        Publisher::new(Arc::new(sink)).with_chunk_size(config.transfer.upload_chunk_size);

    let mut settings = PublishSettings::new(&args.local_dir, args.remote_root.clone());
    settings.dataset_name = args.dataset_name.clone();
    settings.keep_archives = args.keep_archives;
    settings.failure_mode = FailureMode::from_keep_going(args.keep_going);

    let store = ManifestStore::new(config.manifest_path());
    info!(
        "Publishing {} to {} (manifest {})",
        args.local_dir.display(),
        args.remote_root,
        store.path().display()
    );

    let pipeline = PublishPipeline::new(publisher, store, settings)
        .with_progress(Arc::new(ProgressDisplay::new(ProgressConfig::for_quiet(quiet))));

    let summary = pipeline.run().await?;
    report(&summary, quiet);
    summary.into_result().map(|_| ())
}

/// Handle the list command
pub async fn handle_list(args: ListArgs, config: &AppConfig) -> Result<()> {
    let catalog = CatalogStore::new(&config.paths.catalog_dir)
        .load(args.partition)
        .await?;

    if let Some(dataset) = &args.dataset_name {
        let items = resolve(&catalog, &SelectionFilter::dataset(dataset.clone()))?;
        println!("{} ({}): {} items", dataset, catalog.partition(), items.len());
        for item in &items {
            println!("  {:<24} {}", item.item_name, item.remote_locator);
        }
        return Ok(());
    }

    let items = resolve(&catalog, &SelectionFilter::all())?;
    println!(
        "{} catalog: {} datasets, {} items",
        catalog.partition(),
        catalog.dataset_names().len(),
        catalog.item_count()
    );
    println!("{:<32} {:>8}", "Dataset", "Items");
    println!("{}", "-".repeat(41));
    for name in catalog.dataset_names() {
        let count = items
            .iter()
            .filter(|item| item.dataset_name == name)
            .count();
        println!("{:<32} {:>8}", name, count);
    }
    Ok(())
}

/// Handle the hash command
pub async fn handle_hash(args: HashArgs) -> Result<()> {
    let digest = hash_file(&args.file).await?;
    println!("{}  {}", digest, args.file.display());
    Ok(())
}

/// Handle credential management commands
pub async fn handle_auth(args: AuthArgs) -> Result<()> {
    match args.action {
        AuthAction::Setup { force } => setup_token(force)?,
        AuthAction::Status => show_auth_status(),
        AuthAction::Clear => {
            if clear_stored_token()? {
                println!("Storage token removed from .env");
            } else {
                println!("No stored storage token found");
            }
        }
    }
    Ok(())
}

fn report(summary: &RunSummary, quiet: bool) {
    if quiet {
        for failure in &summary.failures {
            error!("{}/{} failed: {}", failure.dataset, failure.item, failure.error);
        }
        return;
    }

    println!();
    println!("{}", summary.summary());
    println!("   Transferred: {}", format_bytes(summary.bytes_transferred));
    for failure in &summary.failures {
        println!("   Failed: {}/{}: {}", failure.dataset, failure.item, failure.error);
    }
}
