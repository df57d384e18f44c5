//! Content hashing and manifest verification
//!
//! Files are hashed in fixed-size blocks so multi-gigabyte archives never sit
//! in memory. Verification compares a computed digest with the manifest entry
//! for the item; a mismatch halts the run for that item.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::app::hash::HexDigest;
use crate::app::manifest::Manifest;
use crate::constants::transfer;
use crate::errors::{VerifyError, VerifyResult};

/// MD5 of a file, streamed in 1 MiB blocks
pub async fn hash_file(path: &Path) -> VerifyResult<HexDigest> {
    hash_file_with_block_size(path, transfer::HASH_BLOCK_SIZE).await
}

/// MD5 of a file using a caller-chosen block size
pub async fn hash_file_with_block_size(path: &Path, block_size: usize) -> VerifyResult<HexDigest> {
    let io_error = |source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).await.map_err(io_error)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; block_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = file.read(&mut buffer).await.map_err(io_error)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
        total += read as u64;
    }

    let digest = HexDigest::from(context.compute());
    debug!("Hashed {} ({} bytes): {}", path.display(), total, digest);
    Ok(digest)
}

/// Compare a digest with the manifest entry for an item
///
/// Returns whether the digest matches. A missing entry is an error when
/// `mandatory` is set; otherwise it is logged and treated as a pass.
pub fn verify(
    dataset: &str,
    item: &str,
    digest: &HexDigest,
    manifest: &Manifest,
    mandatory: bool,
) -> VerifyResult<bool> {
    match manifest.lookup(dataset, item) {
        Some(expected) => Ok(expected == digest),
        None if mandatory => Err(VerifyError::ManifestEntryMissing {
            dataset: dataset.to_string(),
            item: item.to_string(),
        }),
        None => {
            warn!(
                "No manifest entry for {}/{}, skipping verification",
                dataset, item
            );
            Ok(true)
        }
    }
}

/// Verifies downloaded archives against a manifest
#[derive(Debug, Clone)]
pub struct ContentVerifier {
    manifest: Manifest,
    mandatory: bool,
}

impl ContentVerifier {
    /// Verifier that fails on items missing from the manifest
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            mandatory: true,
        }
    }

    /// Tolerate items missing from the manifest
    pub fn lenient(mut self) -> Self {
        self.mandatory = false;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Hash `path` and check it against the manifest entry for the item
    ///
    /// Returns the computed digest, or `ChecksumMismatch` with both digests.
    pub async fn check(&self, dataset: &str, item: &str, path: &Path) -> VerifyResult<HexDigest> {
        let actual = hash_file(path).await?;

        if verify(dataset, item, &actual, &self.manifest, self.mandatory)? {
            debug!("Checksum verified for {}/{}", dataset, item);
            return Ok(actual);
        }

        let expected = self
            .manifest
            .lookup(dataset, item)
            .map(ToString::to_string)
            .unwrap_or_default();
        Err(VerifyError::ChecksumMismatch {
            dataset: dataset.to_string(),
            item: item.to_string(),
            expected,
            actual: actual.to_string(),
        })
    }
}
