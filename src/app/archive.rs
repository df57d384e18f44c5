//! Zip archive packaging and extraction
//!
//! Both operations are blocking and run on the tokio blocking pool; callers
//! await them before moving on to the next item.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::constants::files;
use crate::errors::{ArchiveError, ArchiveResult};

/// Extract `archive` into `dest_dir`, returning the number of files written
///
/// Existing files are overwritten, so extracting the same archive twice
/// leaves the same tree as extracting it once.
pub async fn extract(archive: &Path, dest_dir: &Path) -> ArchiveResult<usize> {
    let archive = archive.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, &dest_dir))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

/// Package `source_dir` into `<parent>/<basename>.zip`
///
/// Entry paths are relative to `source_dir` and written in sorted order with
/// fixed timestamps, so packaging the same tree twice gives the same bytes.
pub async fn package(source_dir: &Path) -> ArchiveResult<PathBuf> {
    let source_dir = source_dir.to_path_buf();
    tokio::task::spawn_blocking(move || package_blocking(&source_dir))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

/// Where [`package`] writes the archive for `source_dir`
pub fn archive_path_for(source_dir: &Path) -> ArchiveResult<PathBuf> {
    let name = source_dir
        .file_name()
        .ok_or_else(|| ArchiveError::SourceNotFound {
            path: source_dir.to_path_buf(),
            reason: "path has no directory name".to_string(),
        })?;
    let mut file_name = name.to_os_string();
    file_name.push(".");
    file_name.push(files::ARCHIVE_EXTENSION);
    Ok(source_dir.with_file_name(file_name))
}

fn extract_blocking(archive_path: &Path, dest_dir: &Path) -> ArchiveResult<usize> {
    let corrupt = |reason: String| ArchiveError::Corrupt {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| corrupt(e.to_string()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    fs::create_dir_all(dest_dir).map_err(|source| ArchiveError::Io {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| corrupt(format!("entry {}: {}", index, e)))?;

        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| corrupt(format!("entry '{}' escapes the destination", entry.name())))?;
        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|source| ArchiveError::Io {
                path: out_path.clone(),
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut out = File::create(&out_path).map_err(|source| ArchiveError::Io {
            path: out_path.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            // Decompression failures surface as read errors
            corrupt(format!("entry '{}': {}", relative.display(), e))
        })?;
        debug!("Extracted {}", out_path.display());
        written += 1;
    }

    info!(
        "Extracted {} files from {} into {}",
        written,
        archive_path.display(),
        dest_dir.display()
    );
    Ok(written)
}

fn package_blocking(source_dir: &Path) -> ArchiveResult<PathBuf> {
    let not_found = |reason: &str| ArchiveError::SourceNotFound {
        path: source_dir.to_path_buf(),
        reason: reason.to_string(),
    };

    if !source_dir.exists() {
        return Err(not_found("directory does not exist"));
    }
    if !source_dir.is_dir() {
        return Err(not_found("not a directory"));
    }

    let entries = collect_entries(source_dir)?;
    if !entries.iter().any(|(_, is_dir)| !is_dir) {
        return Err(not_found("directory contains no files"));
    }

    let archive_path = archive_path_for(source_dir)?;
    if let Err(e) = write_archive(source_dir, &archive_path, &entries) {
        if archive_path.exists() {
            if let Err(remove_err) = fs::remove_file(&archive_path) {
                warn!(
                    "Failed to remove incomplete archive {}: {}",
                    archive_path.display(),
                    remove_err
                );
            }
        }
        return Err(e);
    }

    info!(
        "Packaged {} into {} ({} entries)",
        source_dir.display(),
        archive_path.display(),
        entries.len()
    );
    Ok(archive_path)
}

/// Relative paths below `source_dir` in sorted order, flagged when a directory
fn collect_entries(source_dir: &Path) -> ArchiveResult<Vec<(PathBuf, bool)>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ArchiveError::Io {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_dir.to_path_buf()),
            source: e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed")),
        })?;

        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_dir() {
            warn!("Skipping non-regular file {}", entry.path().display());
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map(Path::to_path_buf)
            .map_err(|_| ArchiveError::SourceNotFound {
                path: entry.path().to_path_buf(),
                reason: "entry is outside the source directory".to_string(),
            })?;
        entries.push((relative, file_type.is_dir()));
    }

    Ok(entries)
}

fn write_archive(
    source_dir: &Path,
    archive_path: &Path,
    entries: &[(PathBuf, bool)],
) -> ArchiveResult<()> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ArchiveError::Io { path, source }
    };
    let zip_err = |e: zip::result::ZipError| ArchiveError::Io {
        path: archive_path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    };

    let file = File::create(archive_path).map_err(io_err(archive_path))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (relative, is_dir) in entries {
        let name = entry_name(relative);
        if *is_dir {
            zip.add_directory(name, options).map_err(zip_err)?;
            continue;
        }

        let path = source_dir.join(relative);
        zip.start_file(name, options).map_err(zip_err)?;
        let mut input = File::open(&path).map_err(io_err(&path))?;
        io::copy(&mut input, &mut zip).map_err(io_err(&path))?;
        debug!("Added {}", relative.display());
    }

    let mut writer = zip.finish().map_err(zip_err)?;
    io::Write::flush(&mut writer).map_err(io_err(archive_path))?;
    Ok(())
}

/// Zip entry names always use `/`
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Relative path -> contents for every file under `root`
    fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(root).unwrap();
                (entry_name(relative), fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn sample_tree(root: &Path) {
        write(&root.join("images/00000001.png"), &[0x89, b'P', b'N', b'G', 1, 2, 3]);
        write(&root.join("images/00000002.png"), &vec![42u8; 70_000]);
        write(&root.join("cameras.txt"), b"PINHOLE 1024 1024");
        write(&root.join("nested/deeper/points.bin"), b"");
    }

    #[tokio::test]
    async fn test_package_then_extract_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("rosiris_67p");
        sample_tree(&source);

        let archive = package(&source).await.unwrap();
        assert_eq!(archive, temp_dir.path().join("rosiris_67p.zip"));

        let dest = temp_dir.path().join("restored");
        let written = extract(&archive, &dest).await.unwrap();

        assert_eq!(written, 4);
        assert_eq!(snapshot(&dest), snapshot(&source));
    }

    #[tokio::test]
    async fn test_extract_twice_equals_once() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("seg1");
        sample_tree(&source);
        let archive = package(&source).await.unwrap();

        let dest = temp_dir.path().join("out");
        extract(&archive, &dest).await.unwrap();
        let once = snapshot(&dest);

        // Local modification is overwritten on re-extraction
        fs::write(dest.join("cameras.txt"), b"edited").unwrap();
        extract(&archive, &dest).await.unwrap();
        assert_eq!(snapshot(&dest), once);
    }

    #[tokio::test]
    async fn test_package_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("seg1");
        sample_tree(&source);

        let first = fs::read(package(&source).await.unwrap()).unwrap();
        let second = fs::read(package(&source).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_package_missing_or_empty_source() {
        let temp_dir = TempDir::new().unwrap();

        let missing = package(&temp_dir.path().join("absent")).await;
        assert!(matches!(missing, Err(ArchiveError::SourceNotFound { .. })));

        let empty = temp_dir.path().join("empty");
        fs::create_dir_all(empty.join("only_dirs")).unwrap();
        let result = package(&empty).await;
        assert!(matches!(result, Err(ArchiveError::SourceNotFound { .. })));
        assert!(!temp_dir.path().join("empty.zip").exists());
    }

    #[tokio::test]
    async fn test_extract_garbage_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("bad.zip");
        fs::write(&archive, b"this is not a zip archive").unwrap();

        let result = extract(&archive, &temp_dir.path().join("out")).await;
        assert!(matches!(result, Err(ArchiveError::Corrupt { .. })));

        let missing = extract(&temp_dir.path().join("nope.zip"), temp_dir.path()).await;
        assert!(matches!(missing, Err(ArchiveError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_extract_rejects_escaping_entries() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            zip.start_file("../escaped.txt", FileOptions::default())
                .unwrap();
            zip.write_all(b"outside").unwrap();
            zip.finish().unwrap();
        }

        let dest = temp_dir.path().join("out");
        let result = extract(&archive, &dest).await;
        assert!(matches!(result, Err(ArchiveError::Corrupt { .. })));
        assert!(!temp_dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let relative: PathBuf = ["images", "00000001.png"].iter().collect();
        assert_eq!(entry_name(&relative), "images/00000001.png");
    }
}
