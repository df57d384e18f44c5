//! Fetch path: resolve, fetch, verify and extract

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{FailureMode, RunSummary};
use crate::app::archive;
use crate::app::catalog::Catalog;
use crate::app::models::TransferItem;
use crate::app::selection::{resolve, SelectionFilter};
use crate::app::transfer::{Fetcher, NoProgress, ProgressFactory};
use crate::app::verify::ContentVerifier;
use crate::errors::Result;

/// Behaviour of a fetch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Root under which `<partition>/<dataset>/<item>.zip` is written
    pub local_root: PathBuf,
    /// Extract each archive after it is verified
    pub unpack: bool,
    /// Keep the archive once it has been extracted
    pub keep_archives: bool,
    pub failure_mode: FailureMode,
    /// Resolve and report without transferring anything
    pub dry_run: bool,
}

impl FetchSettings {
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            unpack: true,
            keep_archives: true,
            failure_mode: FailureMode::FailFast,
            dry_run: false,
        }
    }
}

/// Downloads every item a selection resolves to
pub struct FetchPipeline {
    fetcher: Fetcher,
    verifier: Option<ContentVerifier>,
    settings: FetchSettings,
    progress: Arc<dyn ProgressFactory>,
}

impl FetchPipeline {
    /// Pipeline without verification or progress reporting
    pub fn new(fetcher: Fetcher, settings: FetchSettings) -> Self {
        Self {
            fetcher,
            verifier: None,
            settings,
            progress: Arc::new(NoProgress),
        }
    }

    /// Check each download against the manifest before extracting it
    pub fn with_verifier(mut self, verifier: ContentVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressFactory>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Resolve `filter` against `catalog` and process each item in order
    ///
    /// Selection errors abort before any transfer. Item errors stop the run
    /// in fail-fast mode and are collected in keep-going mode.
    pub async fn run(&self, catalog: &Catalog, filter: &SelectionFilter) -> Result<RunSummary> {
        let started = Instant::now();
        let items = resolve(catalog, filter)?;
        info!(
            "Resolved {} items from the {} catalog",
            items.len(),
            catalog.partition()
        );

        if items.is_empty() {
            warn!("Selection matched no items");
        }
        if self.verifier.is_none() && !self.settings.dry_run {
            warn!("Checksum verification is disabled for this run");
        }

        let mut summary = RunSummary::new(items.len(), self.settings.dry_run);
        for (index, item) in items.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, items.len(), item.label());

            let result = if self.settings.dry_run {
                info!(
                    "Would fetch {} to {}",
                    item.remote_locator,
                    item.local_destination(&self.settings.local_root).display()
                );
                Ok(0)
            } else {
                self.process(item).await
            };

            summary.record(
                self.settings.failure_mode,
                &item.dataset_name,
                &item.item_name,
                result,
            )?;
        }

        Ok(summary.finish(started))
    }

    async fn process(&self, item: &TransferItem) -> Result<u64> {
        let root = &self.settings.local_root;
        let destination = item.local_destination(root);

        let progress = self.progress.for_transfer(&item.label());
        let bytes = self
            .fetcher
            .fetch(&item.remote_locator, &destination, progress.as_ref())
            .await?;

        if let Some(verifier) = &self.verifier {
            verifier
                .check(&item.dataset_name, &item.item_name, &destination)
                .await?;
        }

        if self.settings.unpack {
            let target = item.extraction_dir(root);
            archive::extract(&destination, &target).await?;

            if !self.settings.keep_archives {
                tokio::fs::remove_file(&destination)
                    .await
                    .map_err(|e| crate::errors::TransferError::io(&destination, e))?;
                debug!("Removed archive {}", destination.display());
            }
        }

        Ok(bytes)
    }
}
