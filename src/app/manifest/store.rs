//! Manifest persistence
//!
//! The only code that touches the manifest file. Saves go through a temporary
//! file and a rename so an interrupted run never leaves a truncated manifest.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::Manifest;
use crate::constants::files;
use crate::errors::{ManifestError, ManifestResult};

/// Reads and writes the manifest file
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, failing if the file does not exist
    pub async fn load(&self) -> ManifestResult<Manifest> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => ManifestError::NotFound {
                    path: self.path.clone(),
                },
                _ => ManifestError::Io {
                    path: self.path.clone(),
                    source,
                },
            })?;

        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| ManifestError::Json {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            "Loaded manifest {} with {} entries",
            self.path.display(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Load the manifest, starting empty if the file does not exist yet
    pub async fn load_or_default(&self) -> ManifestResult<Manifest> {
        match self.load().await {
            Err(ManifestError::NotFound { path }) => {
                warn!("No manifest at {}, starting empty", path.display());
                Ok(Manifest::new())
            }
            other => other,
        }
    }

    /// Replace the manifest file with the given manifest
    pub async fn save(&self, manifest: &Manifest) -> ManifestResult<()> {
        let content =
            serde_json::to_string_pretty(manifest).map_err(|source| ManifestError::Json {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ManifestError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let temp_path = sibling_with_suffix(&self.path, files::TEMP_FILE_SUFFIX);
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|source| ManifestError::Io {
                path: temp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| ManifestError::Io {
                path: self.path.clone(),
                source,
            })?;

        info!(
            "Saved manifest {} ({} entries)",
            self.path.display(),
            manifest.len()
        );
        Ok(())
    }

    /// Take the exclusive publish lock for this manifest
    pub fn lock(&self) -> ManifestResult<PublishLock> {
        PublishLock::acquire(&self.path)
    }
}

/// Exclusive lock file held for the duration of a publish run
///
/// The lock file is removed when the guard is dropped. A lock left behind by
/// a killed process must be removed by hand.
#[derive(Debug)]
pub struct PublishLock {
    lock_path: PathBuf,
}

impl PublishLock {
    fn acquire(manifest_path: &Path) -> ManifestResult<Self> {
        let lock_path = sibling_with_suffix(manifest_path, files::LOCK_FILE_SUFFIX);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => ManifestError::Locked {
                    path: manifest_path.to_path_buf(),
                    lock_path: lock_path.clone(),
                },
                _ => ManifestError::Io {
                    path: lock_path.clone(),
                    source,
                },
            })?;

        writeln!(file, "{}", std::process::id()).map_err(|source| ManifestError::Io {
            path: lock_path.clone(),
            source,
        })?;

        debug!("Acquired publish lock {}", lock_path.display());
        Ok(Self { lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(
                "Failed to remove publish lock {}: {}",
                self.lock_path.display(),
                e
            );
        }
    }
}

/// `md5.json` + `.tmp` -> `md5.json.tmp`
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
