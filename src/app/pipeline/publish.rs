//! Publish path: package, upload, hash and record
//!
//! Every immediate subdirectory of the local directory is one unit. Units
//! are processed in name order and the manifest is written once, after the
//! last unit, while the publish lock is held.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{FailureMode, RunSummary};
use crate::app::archive;
use crate::app::hash::HexDigest;
use crate::app::manifest::{Manifest, ManifestStore};
use crate::app::models::archive_file_name;
use crate::app::transfer::{NoProgress, ProgressFactory, Publisher};
use crate::app::verify;
use crate::errors::{AppError, ArchiveError, Result, TransferError};

/// Behaviour of a publish run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// Directory whose subdirectories are published
    pub local_dir: PathBuf,
    /// Remote folder the archives are written to
    pub remote_root: String,
    /// Manifest dataset key; defaults to the name of `local_dir`
    pub dataset_name: Option<String>,
    /// Keep each local archive after it has been uploaded
    pub keep_archives: bool,
    pub failure_mode: FailureMode,
}

impl PublishSettings {
    pub fn new(local_dir: impl Into<PathBuf>, remote_root: impl Into<String>) -> Self {
        Self {
            local_dir: local_dir.into(),
            remote_root: remote_root.into(),
            dataset_name: None,
            keep_archives: false,
            failure_mode: FailureMode::FailFast,
        }
    }

    /// Manifest key the units are recorded under
    pub fn dataset_key(&self) -> Result<String> {
        if let Some(name) = &self.dataset_name {
            return Ok(name.clone());
        }
        self.local_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::generic(format!(
                    "Cannot derive a dataset name from {}; pass --dataset-name",
                    self.local_dir.display()
                ))
            })
    }
}

/// Packages and uploads local results, recording their digests
pub struct PublishPipeline {
    publisher: Publisher,
    store: ManifestStore,
    settings: PublishSettings,
    progress: Arc<dyn ProgressFactory>,
}

impl PublishPipeline {
    pub fn new(publisher: Publisher, store: ManifestStore, settings: PublishSettings) -> Self {
        Self {
            publisher,
            store,
            settings,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressFactory>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Publish every unit under the local directory
    ///
    /// Digests of units published before a fail-fast error are still written
    /// to the manifest before the error is returned.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let _lock = self.store.lock()?;

        let dataset = self.settings.dataset_key()?;
        let units = list_units(&self.settings.local_dir).await?;
        info!(
            "Publishing {} units of {} to {}",
            units.len(),
            dataset,
            self.settings.remote_root
        );

        let mut manifest = self.store.load_or_default().await?;
        let mut recorded = 0;
        let mut summary = RunSummary::new(units.len(), false);

        for (index, unit) in units.iter().enumerate() {
            let name = unit_name(unit);
            info!("[{}/{}] {}/{}", index + 1, units.len(), dataset, name);

            let result = match self.process(unit, &dataset, &name).await {
                Ok((bytes, digest)) => {
                    debug!("{}/{} digest {}", dataset, name, digest);
                    manifest = manifest.update(&dataset, &name, digest);
                    recorded += 1;
                    Ok(bytes)
                }
                Err(e) => Err(e),
            };

            if let Err(e) = summary.record(self.settings.failure_mode, &dataset, &name, result) {
                error!("Stopping publish run: {}", e);
                // The unit error stays the run's error even if the manifest cannot be written
                if let Err(persist_error) = self.persist(&manifest, recorded).await {
                    error!(
                        "Failed to record {} published units: {}",
                        recorded, persist_error
                    );
                }
                return Err(e);
            }
        }

        self.persist(&manifest, recorded).await?;
        Ok(summary.finish(started))
    }

    async fn process(&self, unit: &Path, dataset: &str, name: &str) -> Result<(u64, HexDigest)> {
        let archive_path = archive::package(unit).await?;
        let destination = remote_destination(&self.settings.remote_root, name);

        let label = format!("{}/{}", dataset, name);
        let progress = self.progress.for_transfer(&label);
        let outcome = self
            .publisher
            .publish(&archive_path, &destination, progress.as_ref())
            .await?;

        let digest = verify::hash_file(&archive_path).await?;

        if !self.settings.keep_archives {
            tokio::fs::remove_file(&archive_path)
                .await
                .map_err(|e| TransferError::io(&archive_path, e))?;
            debug!("Removed local archive {}", archive_path.display());
        }

        Ok((outcome.bytes_sent, digest))
    }

    async fn persist(&self, manifest: &Manifest, recorded: usize) -> Result<()> {
        if recorded == 0 {
            warn!("No units were published, manifest left unchanged");
            return Ok(());
        }
        self.store.save(manifest).await?;
        Ok(())
    }
}

/// Immediate subdirectories of `local_dir`, sorted by name
async fn list_units(local_dir: &Path) -> Result<Vec<PathBuf>> {
    let not_found = |e: std::io::Error| ArchiveError::SourceNotFound {
        path: local_dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut reader = tokio::fs::read_dir(local_dir).await.map_err(not_found)?;
    let mut units = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(not_found)? {
        let file_type = entry.file_type().await.map_err(not_found)?;
        if file_type.is_dir() {
            units.push(entry.path());
        }
    }
    units.sort();
    Ok(units)
}

fn unit_name(unit: &Path) -> String {
    unit.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `/research/clusters` + `00000007` -> `/research/clusters/00000007.zip`
fn remote_destination(remote_root: &str, unit: &str) -> String {
    format!(
        "{}/{}",
        remote_root.trim_end_matches('/'),
        archive_file_name(unit)
    )
}
