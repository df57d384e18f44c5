//! Catalog loading and indexing
//!
//! A catalog lists which items exist under each dataset of a partition. Two
//! item shapes are accepted per dataset:
//!
//! - an ordered array of item names: `{"dawn_vesta": ["00000007", "00000012"]}`
//! - a URL-keyed mapping: `{"dawn_vesta": {"00000007": "https://..."}}`
//!
//! The `clusters` catalog adds one level keyed by split:
//! `{"train": {...}, "test": {...}}`. Declaration order is preserved
//! everywhere (serde_json is built with `preserve_order`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::app::models::{Partition, Split};
use crate::errors::{CatalogError, CatalogResult};

/// Items declared under one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemList {
    /// Plain item names, fetched from the hub by path
    Names(Vec<String>),
    /// Item name to absolute URL
    Locators(Vec<(String, String)>),
}

impl ItemList {
    pub fn len(&self) -> usize {
        match self {
            ItemList::Names(names) => names.len(),
            ItemList::Locators(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item names in declaration order
    pub fn names(&self) -> Vec<&str> {
        match self {
            ItemList::Names(names) => names.iter().map(String::as_str).collect(),
            ItemList::Locators(pairs) => pairs.iter().map(|(name, _)| name.as_str()).collect(),
        }
    }

    /// URL recorded for an item, if this is a URL-keyed list
    pub fn locator(&self, item: &str) -> Option<&str> {
        match self {
            ItemList::Names(_) => None,
            ItemList::Locators(pairs) => pairs
                .iter()
                .find(|(name, _)| name == item)
                .map(|(_, url)| url.as_str()),
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.names().contains(&item)
    }
}

/// One dataset and its items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub name: String,
    pub items: ItemList,
}

/// Ordered datasets of one partition (or one clusters split)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTable {
    datasets: Vec<DatasetEntry>,
}

impl DatasetTable {
    pub fn datasets(&self) -> &[DatasetEntry] {
        &self.datasets
    }

    pub fn get(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets.iter().find(|entry| entry.name == name)
    }

    pub fn item_count(&self) -> usize {
        self.datasets.iter().map(|entry| entry.items.len()).sum()
    }
}

/// Shape of a partition's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLayout {
    /// `train`, `test` and `segments`
    Flat(DatasetTable),
    /// `clusters`, with independent namespaces per split
    PerSplit {
        train: DatasetTable,
        test: DatasetTable,
    },
}

/// Parsed catalog for one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    partition: Partition,
    layout: CatalogLayout,
}

impl Catalog {
    /// Parse a per-partition descriptor such as `lists/segments.json`
    pub fn from_json_str(partition: Partition, json: &str) -> CatalogResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| invalid_json(partition, &e))?;
        Self::from_value(partition, &value)
    }

    /// Parse a combined document keyed by partition name and pick one partition
    ///
    /// A partition absent from the document yields an empty catalog.
    pub fn from_partitioned_json_str(partition: Partition, json: &str) -> CatalogResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| invalid_json(partition, &e))?;
        let root = expect_object(partition, &value, "catalog root")?;
        match root.get(partition.as_str()) {
            Some(inner) => Self::from_value(partition, inner),
            None => Ok(Self::empty(partition)),
        }
    }

    /// Catalog with no datasets
    pub fn empty(partition: Partition) -> Self {
        let layout = match partition {
            Partition::Clusters => CatalogLayout::PerSplit {
                train: DatasetTable::default(),
                test: DatasetTable::default(),
            },
            _ => CatalogLayout::Flat(DatasetTable::default()),
        };
        Self { partition, layout }
    }

    fn from_value(partition: Partition, value: &Value) -> CatalogResult<Self> {
        let root = expect_object(partition, value, "catalog root")?;

        let layout = match partition {
            Partition::Clusters => {
                if let Some(key) = root.keys().find(|k| *k != "train" && *k != "test") {
                    return Err(malformed(
                        partition,
                        format!("unexpected split '{}' (expected 'train' or 'test')", key),
                    ));
                }
                let table_for = |split: Split| -> CatalogResult<DatasetTable> {
                    match root.get(split.as_str()) {
                        Some(value) => parse_table(
                            partition,
                            expect_object(partition, value, split.as_str())?,
                        ),
                        None => Ok(DatasetTable::default()),
                    }
                };
                CatalogLayout::PerSplit {
                    train: table_for(Split::Train)?,
                    test: table_for(Split::Test)?,
                }
            }
            _ => CatalogLayout::Flat(parse_table(partition, root)?),
        };

        let catalog = Self { partition, layout };
        debug!(
            "Parsed {} catalog: {} datasets, {} items",
            partition,
            catalog.dataset_names().len(),
            catalog.item_count()
        );
        Ok(catalog)
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn layout(&self) -> &CatalogLayout {
        &self.layout
    }

    /// Dataset names, split-qualified for clusters
    pub fn dataset_names(&self) -> Vec<String> {
        match &self.layout {
            CatalogLayout::Flat(table) => table
                .datasets()
                .iter()
                .map(|entry| entry.name.clone())
                .collect(),
            CatalogLayout::PerSplit { train, test } => Split::ALL
                .into_iter()
                .zip([train, test])
                .flat_map(|(split, table)| {
                    table
                        .datasets()
                        .iter()
                        .map(move |entry| split.qualify(&entry.name))
                })
                .collect(),
        }
    }

    /// Total number of items across all datasets
    pub fn item_count(&self) -> usize {
        match &self.layout {
            CatalogLayout::Flat(table) => table.item_count(),
            CatalogLayout::PerSplit { train, test } => train.item_count() + test.item_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Reads catalog descriptors from a directory
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalog_dir: PathBuf,
}

impl CatalogStore {
    pub fn new(catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog_dir: catalog_dir.into(),
        }
    }

    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }

    /// Path of the descriptor for a partition
    pub fn path_for(&self, partition: Partition) -> PathBuf {
        self.catalog_dir.join(partition.catalog_file_name())
    }

    /// Load and parse the descriptor for a partition
    pub async fn load(&self, partition: Partition) -> CatalogResult<Catalog> {
        let path = self.path_for(partition);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => CatalogError::NotFound {
                    partition: partition.to_string(),
                    path: path.clone(),
                },
                _ => CatalogError::Io {
                    path: path.clone(),
                    source,
                },
            })?;

        let catalog = Catalog::from_json_str(partition, &content)?;
        info!(
            "Loaded {} catalog from {} ({} items)",
            partition,
            path.display(),
            catalog.item_count()
        );
        Ok(catalog)
    }
}

fn malformed(partition: Partition, reason: impl Into<String>) -> CatalogError {
    CatalogError::Malformed {
        partition: partition.to_string(),
        reason: reason.into(),
    }
}

/// Keeps serde's line and column in the reason
fn invalid_json(partition: Partition, error: &serde_json::Error) -> CatalogError {
    malformed(partition, format!("invalid JSON: {}", error))
}

fn expect_object<'a>(
    partition: Partition,
    value: &'a Value,
    context: &str,
) -> CatalogResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| malformed(partition, format!("{} must be a JSON object", context)))
}

fn parse_table(partition: Partition, root: &Map<String, Value>) -> CatalogResult<DatasetTable> {
    let datasets = root
        .iter()
        .map(|(name, value)| {
            Ok(DatasetEntry {
                name: name.clone(),
                items: parse_items(partition, name, value)?,
            })
        })
        .collect::<CatalogResult<Vec<_>>>()?;

    Ok(DatasetTable { datasets })
}

fn parse_items(partition: Partition, dataset: &str, value: &Value) -> CatalogResult<ItemList> {
    let mut seen = HashSet::new();
    let mut check_unique = |item: &str| {
        if seen.insert(item.to_string()) {
            Ok(())
        } else {
            Err(malformed(
                partition,
                format!("duplicate item '{}' in dataset '{}'", item, dataset),
            ))
        }
    };

    match value {
        Value::Array(values) => {
            let mut names = Vec::with_capacity(values.len());
            for value in values {
                let name = value.as_str().ok_or_else(|| {
                    malformed(
                        partition,
                        format!("dataset '{}' lists a non-string item: {}", dataset, value),
                    )
                })?;
                check_unique(name)?;
                names.push(name.to_string());
            }
            Ok(ItemList::Names(names))
        }
        Value::Object(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (name, locator) in map {
                let url = locator.as_str().ok_or_else(|| {
                    malformed(
                        partition,
                        format!(
                            "item '{}' in dataset '{}' has a non-string locator",
                            name, dataset
                        ),
                    )
                })?;
                check_unique(name)?;
                pairs.push((name.clone(), url.to_string()));
            }
            Ok(ItemList::Locators(pairs))
        }
        other => Err(malformed(
            partition,
            format!(
                "dataset '{}' must map to an array or object, found {}",
                dataset, other
            ),
        )),
    }
}
