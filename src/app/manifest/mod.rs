//! Integrity manifest
//!
//! The manifest maps dataset name to item name to the expected hex digest of
//! the item's archive. It is loaded once per run, passed by value through
//! [`Manifest::update`] during publishing, and written back wholesale by
//! [`ManifestStore::save`] at the end of the run.
//!
//! # Module Organization
//!
//! - [`store`] - Loading, atomic saving and the publish lock

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::app::hash::HexDigest;

pub mod store;

pub use store::{ManifestStore, PublishLock};

/// Dataset -> item -> expected digest
///
/// Keys are kept sorted so that rewrites of the manifest file are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, BTreeMap<String, HexDigest>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded digest for an exact dataset/item pair
    pub fn get(&self, dataset: &str, item: &str) -> Option<&HexDigest> {
        self.entries.get(dataset).and_then(|items| items.get(item))
    }

    /// Recorded digest, falling back from a split-qualified dataset name
    ///
    /// Cluster datasets are resolved as `train/<dataset>` but published under
    /// the bare dataset directory name, so `train/dawn_vesta` also matches
    /// entries recorded under `dawn_vesta`.
    pub fn lookup(&self, dataset: &str, item: &str) -> Option<&HexDigest> {
        self.get(dataset, item).or_else(|| {
            dataset
                .rsplit_once('/')
                .and_then(|(_, base)| self.get(base, item))
        })
    }

    /// Return a manifest with one entry inserted or replaced
    pub fn update(mut self, dataset: &str, item: &str, digest: HexDigest) -> Self {
        self.entries
            .entry(dataset.to_string())
            .or_default()
            .insert(item.to_string(), digest);
        self
    }

    /// Dataset names with at least one entry
    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of item entries across all datasets
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(hex: &str) -> HexDigest {
        HexDigest::from_hex(hex).unwrap()
    }

    #[test]
    fn test_update_inserts_and_replaces() {
        let manifest = Manifest::new()
            .update("orex_bennu", "seg1", digest("abc123"))
            .update("orex_bennu", "seg2", digest("def456"));
        assert_eq!(manifest.len(), 2);

        let manifest = manifest.update("orex_bennu", "seg1", digest("fff000"));
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("orex_bennu", "seg1"), Some(&digest("fff000")));
    }

    #[test]
    fn test_update_leaves_original_untouched() {
        let original = Manifest::new().update("dawn_vesta", "00000007", digest("aa"));
        let updated = original.clone().update("dawn_vesta", "00000012", digest("bb"));

        assert_eq!(original.len(), 1);
        assert_eq!(updated.len(), 2);
        assert!(original.get("dawn_vesta", "00000012").is_none());
    }

    #[test]
    fn test_lookup_falls_back_to_bare_dataset() {
        let manifest = Manifest::new().update("dawn_vesta", "00000007", digest("abc123"));

        assert_eq!(
            manifest.lookup("train/dawn_vesta", "00000007"),
            Some(&digest("abc123"))
        );
        assert!(manifest.get("train/dawn_vesta", "00000007").is_none());
        assert!(manifest.lookup("train/dawn_vesta", "00000008").is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"orex_bennu":{"seg1":"abc123"}}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.get("orex_bennu", "seg1"), Some(&digest("abc123")));
        assert_eq!(serde_json::to_string(&manifest).unwrap(), json);
        assert_eq!(manifest.datasets().collect::<Vec<_>>(), vec!["orex_bennu"]);
    }
}
