//! Streaming downloads
//!
//! The remote body is written through a buffer of one chunk, so memory use is
//! bounded by the chunk size no matter how large the archive is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use super::{ObjectSource, ProgressCallback, TransferProgress};
use crate::app::models::RemoteLocator;
use crate::constants::{files, transfer};
use crate::errors::{TransferError, TransferResult};

/// What happens to a partially written file when a download fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Leave the partial file on disk
    #[default]
    Keep,
    /// Delete the partial file
    Remove,
}

/// Download tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    chunk_size: usize,
    /// Write to `<name>.part` and rename into place on success
    pub atomic: bool,
    pub partial_policy: PartialPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            chunk_size: transfer::FETCH_CHUNK_SIZE,
            atomic: false,
            partial_policy: PartialPolicy::Keep,
        }
    }
}

impl FetchOptions {
    /// Set the chunk size, raised to the 16 KiB minimum if smaller
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size < transfer::MIN_CHUNK_SIZE {
            warn!(
                "Fetch chunk size {} is below the minimum, using {}",
                chunk_size,
                transfer::MIN_CHUNK_SIZE
            );
        }
        self.chunk_size = chunk_size.max(transfer::MIN_CHUNK_SIZE);
        self
    }

    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn with_partial_policy(mut self, partial_policy: PartialPolicy) -> Self {
        self.partial_policy = partial_policy;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Streams remote objects to local files
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn ObjectSource>,
    options: FetchOptions,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(source: Arc<dyn ObjectSource>, options: FetchOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Download `locator` to `local_path`, returning the bytes written
    ///
    /// Parent directories are created as needed and an existing file is
    /// replaced. On failure the partial file is kept or removed according to
    /// [`FetchOptions::partial_policy`].
    pub async fn fetch(
        &self,
        locator: &RemoteLocator,
        local_path: &Path,
        progress: &dyn ProgressCallback,
    ) -> TransferResult<u64> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }

        let write_path = if self.options.atomic {
            partial_path(local_path)
        } else {
            local_path.to_path_buf()
        };

        match self.stream_to(locator, &write_path, progress).await {
            Ok(written) => {
                if self.options.atomic {
                    tokio::fs::rename(&write_path, local_path)
                        .await
                        .map_err(|_| TransferError::AtomicOperationFailed {
                            temp_path: write_path.clone(),
                            final_path: local_path.to_path_buf(),
                        })?;
                }
                info!("Fetched {} ({} bytes)", local_path.display(), written);
                Ok(written)
            }
            Err(e) => {
                self.handle_partial(&write_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        locator: &RemoteLocator,
        write_path: &Path,
        progress: &dyn ProgressCallback,
    ) -> TransferResult<u64> {
        let mut remote = self.source.open(locator).await?;
        debug!(
            "Streaming {} to {} (size: {:?})",
            locator,
            write_path.display(),
            remote.content_length
        );

        let file = File::create(write_path)
            .await
            .map_err(|e| TransferError::io(write_path, e))?;
        let mut writer = BufWriter::with_capacity(self.options.chunk_size, file);

        let mut state = TransferProgress {
            bytes_transferred: 0,
            total_bytes: remote.content_length,
        };

        while let Some(chunk) = remote.body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Persist what arrived so a kept partial file is accurate
                    let _ = writer.flush().await;
                    return Err(e);
                }
            };
            if chunk.is_empty() {
                continue;
            }
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(write_path, e))?;
            state.bytes_transferred += chunk.len() as u64;
            progress.on_progress(&state);
        }

        writer
            .flush()
            .await
            .map_err(|e| TransferError::io(write_path, e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| TransferError::io(write_path, e))?;

        progress.on_complete(&state);
        Ok(state.bytes_transferred)
    }

    async fn handle_partial(&self, write_path: &Path) {
        if !write_path.exists() {
            return;
        }
        match self.options.partial_policy {
            PartialPolicy::Keep => {
                warn!("Keeping partial download at {}", write_path.display());
            }
            PartialPolicy::Remove => {
                if let Err(e) = tokio::fs::remove_file(write_path).await {
                    warn!(
                        "Failed to remove partial download {}: {}",
                        write_path.display(),
                        e
                    );
                } else {
                    debug!("Removed partial download {}", write_path.display());
                }
            }
        }
    }
}

/// `seg1.zip` -> `seg1.zip.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(files::PARTIAL_FILE_SUFFIX);
    path.with_file_name(name)
}
