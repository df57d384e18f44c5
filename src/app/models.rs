//! Core data types shared across the transfer pipeline
//!
//! Partitions, splits, remote locators and the resolved `TransferItem`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::files;

/// Top-level division of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Training clusters
    Train,
    /// Testing clusters
    Test,
    /// Clusters catalogued per train/test split
    Clusters,
    /// Contiguous imagery runs, independent of split
    Segments,
}

impl Partition {
    /// All partitions in catalog-file order
    pub const ALL: [Partition; 4] = [
        Partition::Test,
        Partition::Train,
        Partition::Clusters,
        Partition::Segments,
    ];

    /// Name used for the catalog file and the local directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
            Partition::Clusters => "clusters",
            Partition::Segments => "segments",
        }
    }

    /// Prefix of this partition's objects on the hub
    ///
    /// The hub stores train and test archives at the repository root.
    pub fn remote_prefix(&self) -> &'static str {
        match self {
            Partition::Train | Partition::Test => "",
            Partition::Clusters => "clusters",
            Partition::Segments => "segments",
        }
    }

    /// Catalog file name for this partition
    pub fn catalog_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Partition::Train),
            "test" => Ok(Partition::Test),
            "clusters" => Ok(Partition::Clusters),
            "segments" => Ok(Partition::Segments),
            other => Err(format!("unknown partition '{}'", other)),
        }
    }
}

/// Train/test split inside the clusters catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    /// Splits in merge order
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    /// Dataset name qualified by this split, e.g. `train/dawn_vesta`
    pub fn qualify(&self, dataset: &str) -> String {
        format!("{}/{}", self.as_str(), dataset)
    }
}

/// Where a transfer item lives remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLocator {
    /// Path relative to the hub repository root
    HubPath(String),
    /// Absolute URL taken from a URL-keyed catalog
    Url(String),
}

impl RemoteLocator {
    /// Locator string as written in logs
    pub fn as_str(&self) -> &str {
        match self {
            RemoteLocator::HubPath(path) | RemoteLocator::Url(path) => path,
        }
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteLocator::HubPath(path) => write!(f, "hub:{}", path),
            RemoteLocator::Url(url) => f.write_str(url),
        }
    }
}

/// One resolved unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// Dataset name, split-qualified for clusters (`train/dawn_vesta`)
    pub dataset_name: String,
    /// Cluster or segment name
    pub item_name: String,
    /// Remote object this item is fetched from
    pub remote_locator: RemoteLocator,
    /// Archive path relative to the local root
    pub relative_path: PathBuf,
}

impl TransferItem {
    /// Archive path under the given local root
    pub fn local_destination(&self, local_root: &Path) -> PathBuf {
        local_root.join(&self.relative_path)
    }

    /// Directory the archive is extracted into: `<dataset>/<item>/`
    pub fn extraction_dir(&self, local_root: &Path) -> PathBuf {
        self.local_destination(local_root).with_extension("")
    }

    /// Short label for progress bars and logs
    pub fn label(&self) -> String {
        format!("{}/{}", self.dataset_name, self.item_name)
    }
}

/// Archive file name for an item
pub fn archive_file_name(item_name: &str) -> String {
    format!("{}.{}", item_name, files::ARCHIVE_EXTENSION)
}

/// Join non-empty path segments with `/` for remote paths
pub fn remote_path(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|segment| !segment.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
