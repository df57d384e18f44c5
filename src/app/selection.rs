//! Selection resolution
//!
//! Turns a partial user selection into the ordered, deduplicated list of
//! transfer items it denotes. Resolution is a pure function of the catalog and
//! the filter; catalog loading and path roots are the caller's concern.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::debug;

use crate::app::catalog::{Catalog, CatalogLayout, DatasetEntry};
use crate::app::models::{archive_file_name, remote_path, Partition, RemoteLocator, Split, TransferItem};
use crate::errors::{SelectionError, SelectionResult};

/// Narrows a partition's catalog to a subset
///
/// All fields unset selects every item in the partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    pub dataset_name: Option<String>,
    pub cluster_name: Option<String>,
    pub segment_name: Option<String>,
}

impl SelectionFilter {
    /// Select everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Select every item of one dataset
    pub fn dataset(name: impl Into<String>) -> Self {
        Self {
            dataset_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_cluster(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn with_segment(mut self, name: impl Into<String>) -> Self {
        self.segment_name = Some(name.into());
        self
    }

    /// Item name that applies to the partition
    ///
    /// Segments are named by `segment_name`, everything else by
    /// `cluster_name`; the other field is used as a fallback.
    pub fn item_name(&self, partition: Partition) -> Option<&str> {
        let (primary, fallback) = match partition {
            Partition::Segments => (&self.segment_name, &self.cluster_name),
            _ => (&self.cluster_name, &self.segment_name),
        };
        primary.as_deref().or(fallback.as_deref())
    }

    pub fn is_all(&self) -> bool {
        self.dataset_name.is_none() && self.cluster_name.is_none() && self.segment_name.is_none()
    }
}

/// A dataset entry together with its name as it appears in paths
struct Candidate<'a> {
    qualified_name: String,
    entry: &'a DatasetEntry,
}

/// Resolve a filter against a catalog into transfer items
///
/// Items are returned in catalog declaration order (train split before test
/// split for clusters) with duplicate `(dataset, item)` pairs removed.
pub fn resolve(catalog: &Catalog, filter: &SelectionFilter) -> SelectionResult<Vec<TransferItem>> {
    let partition = catalog.partition();
    let item_name = filter.item_name(partition);

    if let (None, Some(item)) = (&filter.dataset_name, item_name) {
        return Err(SelectionError::MissingDataset {
            item: item.to_string(),
        });
    }

    let candidates = select_datasets(catalog, filter.dataset_name.as_deref())?;

    let mut items = Vec::new();
    match item_name {
        Some(item) => {
            // First split that declares the item wins
            let candidate = candidates
                .iter()
                .find(|candidate| candidate.entry.items.contains(item))
                .ok_or_else(|| SelectionError::ItemNotFound {
                    dataset: filter.dataset_name.clone().unwrap_or_default(),
                    item: item.to_string(),
                })?;
            items.push(build_item(partition, candidate, item));
        }
        None => {
            for candidate in &candidates {
                for item in candidate.entry.items.names() {
                    items.push(build_item(partition, candidate, item));
                }
            }
        }
    }

    let resolved = dedup(items);
    debug!(
        "Resolved {} items from the {} catalog for {:?}",
        resolved.len(),
        partition,
        filter
    );
    Ok(resolved)
}

fn select_datasets<'a>(
    catalog: &'a Catalog,
    dataset_name: Option<&str>,
) -> SelectionResult<Vec<Candidate<'a>>> {
    let not_found = |dataset: &str| SelectionError::DatasetNotFound {
        partition: catalog.partition().to_string(),
        dataset: dataset.to_string(),
    };

    let candidates: Vec<Candidate<'a>> = match (catalog.layout(), dataset_name) {
        (CatalogLayout::Flat(table), None) => table
            .datasets()
            .iter()
            .map(|entry| Candidate {
                qualified_name: entry.name.clone(),
                entry,
            })
            .collect(),
        (CatalogLayout::Flat(table), Some(dataset)) => {
            let entry = table.get(dataset).ok_or_else(|| not_found(dataset))?;
            vec![Candidate {
                qualified_name: entry.name.clone(),
                entry,
            }]
        }
        (CatalogLayout::PerSplit { train, test }, None) => Split::ALL
            .into_iter()
            .zip([train, test])
            .flat_map(|(split, table)| {
                table.datasets().iter().map(move |entry| Candidate {
                    qualified_name: split.qualify(&entry.name),
                    entry,
                })
            })
            .collect(),
        (CatalogLayout::PerSplit { train, test }, Some(dataset)) => {
            let merged: Vec<Candidate<'a>> = Split::ALL
                .into_iter()
                .zip([train, test])
                .filter_map(|(split, table)| {
                    table.get(dataset).map(|entry| Candidate {
                        qualified_name: split.qualify(dataset),
                        entry,
                    })
                })
                .collect();
            if merged.is_empty() {
                return Err(not_found(dataset));
            }
            merged
        }
    };

    Ok(candidates)
}

fn build_item(partition: Partition, candidate: &Candidate<'_>, item: &str) -> TransferItem {
    let archive_name = archive_file_name(item);
    let remote_locator = match candidate.entry.items.locator(item) {
        Some(url) => RemoteLocator::Url(url.to_string()),
        None => RemoteLocator::HubPath(remote_path(&[
            partition.remote_prefix(),
            &candidate.qualified_name,
            &archive_name,
        ])),
    };

    let mut relative_path = PathBuf::from(partition.as_str());
    for segment in candidate.qualified_name.split('/') {
        relative_path.push(segment);
    }
    relative_path.push(&archive_name);

    TransferItem {
        dataset_name: candidate.qualified_name.clone(),
        item_name: item.to_string(),
        remote_locator,
        relative_path,
    }
}

fn dedup(items: Vec<TransferItem>) -> Vec<TransferItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.dataset_name.clone(), item.item_name.clone())))
        .collect()
}
