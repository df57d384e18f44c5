//! Integration tests for the fetch path against an in-memory hub
//!
//! Archives are produced by the publish pipeline first, so these tests also
//! cover that a published tree comes back byte-for-byte after a fetch.

mod common;

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use astrovision_sync::app::{
    Catalog, ContentVerifier, FailureMode, FetchOptions, FetchPipeline, FetchSettings, Fetcher,
    Manifest, ManifestStore, Partition, PublishPipeline, PublishSettings, Publisher,
    SelectionFilter,
};
use astrovision_sync::errors::{AppError, VerifyError};
use common::{result_tree, MemoryStore};

const CATALOG: &str = r#"{"rosiris_67p": ["seg1", "seg2"], "orex_bennu": ["seg9"]}"#;

/// Publish `seg1` and `seg2` of `rosiris_67p`, returning the manifest
async fn publish_fixture(store: Arc<MemoryStore>, work: &Path) -> Manifest {
    let local_dir = result_tree(work, "rosiris_67p", &["seg1", "seg2"], 5_000);
    let manifest_store = ManifestStore::new(work.join("md5.json"));

    let publisher = Publisher::new(store).with_chunk_size(2048);
    let mut settings = PublishSettings::new(&local_dir, "/segments/rosiris_67p");
    settings.keep_archives = true;
    PublishPipeline::new(publisher, manifest_store.clone(), settings)
        .run()
        .await
        .unwrap();

    manifest_store.load().await.unwrap()
}

fn fetch_pipeline(store: Arc<MemoryStore>, root: &Path, manifest: Manifest) -> FetchPipeline {
    let fetcher = Fetcher::new(store, FetchOptions::default().with_atomic(true));
    FetchPipeline::new(fetcher, FetchSettings::new(root))
        .with_verifier(ContentVerifier::new(manifest))
}

fn catalog() -> Catalog {
    Catalog::from_json_str(Partition::Segments, CATALOG).unwrap()
}

#[tokio::test]
async fn test_published_results_fetch_back_unchanged() {
    let work = TempDir::new().unwrap();
    let download = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let manifest = publish_fixture(store.clone(), work.path()).await;

    let summary = fetch_pipeline(store, download.path(), manifest)
        .run(&catalog(), &SelectionFilter::dataset("rosiris_67p"))
        .await
        .unwrap();

    assert_eq!(summary.completed, vec!["rosiris_67p/seg1", "rosiris_67p/seg2"]);

    for unit in ["seg1", "seg2"] {
        let original = work.path().join("rosiris_67p").join(unit);
        let fetched = download
            .path()
            .join("segments")
            .join("rosiris_67p")
            .join(unit);

        assert!(fetched.with_extension("zip").exists());
        for file in ["cameras.json", "images/frame_0.png", "images/frame_2.png"] {
            assert_eq!(
                std::fs::read(fetched.join(file)).unwrap(),
                std::fs::read(original.join(file)).unwrap(),
                "{}/{} differs",
                unit,
                file
            );
        }
    }
}

#[tokio::test]
async fn test_single_item_selection() {
    let work = TempDir::new().unwrap();
    let download = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let manifest = publish_fixture(store.clone(), work.path()).await;

    let filter = SelectionFilter::dataset("rosiris_67p").with_segment("seg2");
    let summary = fetch_pipeline(store.clone(), download.path(), manifest)
        .run(&catalog(), &filter)
        .await
        .unwrap();

    assert_eq!(summary.completed, vec!["rosiris_67p/seg2"]);
    let opened: Vec<String> = store
        .call_log()
        .into_iter()
        .filter(|call| call.starts_with("open"))
        .collect();
    assert_eq!(opened, vec!["open segments/rosiris_67p/seg2.zip"]);
}

#[tokio::test]
async fn test_corrupted_archive_is_not_extracted() {
    let work = TempDir::new().unwrap();
    let download = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let manifest = publish_fixture(store.clone(), work.path()).await;

    let mut tampered = store.get("segments/rosiris_67p/seg1.zip").unwrap();
    let middle = tampered.len() / 2;
    tampered[middle] ^= 0xff;
    store.insert("segments/rosiris_67p/seg1.zip", tampered);

    let fetcher = Fetcher::new(store, FetchOptions::default());
    let mut settings = FetchSettings::new(download.path());
    settings.failure_mode = FailureMode::KeepGoing;
    let pipeline = FetchPipeline::new(fetcher, settings)
        .with_verifier(ContentVerifier::new(manifest));

    let summary = pipeline
        .run(&catalog(), &SelectionFilter::dataset("rosiris_67p"))
        .await
        .unwrap();

    assert_eq!(summary.completed, vec!["rosiris_67p/seg2"]);
    assert_eq!(summary.failed_count(), 1);
    match &summary.failures[0].error {
        AppError::Item { item, source, .. } => {
            assert_eq!(item, "seg1");
            assert!(matches!(
                **source,
                AppError::Verify(VerifyError::ChecksumMismatch { .. })
            ));
        }
        other => panic!("Expected item error, got {:?}", other),
    }

    let segments = download.path().join("segments").join("rosiris_67p");
    assert!(!segments.join("seg1").exists());
    assert!(segments.join("seg2").join("cameras.json").exists());
}

#[tokio::test]
async fn test_missing_manifest_entry_fails_strict_verification() {
    let download = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.insert("segments/orex_bennu/seg9.zip", b"not checked".to_vec());

    let pipeline = fetch_pipeline(store.clone(), download.path(), Manifest::new());
    let err = pipeline
        .run(&catalog(), &SelectionFilter::dataset("orex_bennu"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "verification");

    // Lenient verification accepts the same download
    let fetcher = Fetcher::new(store, FetchOptions::default());
    let mut settings = FetchSettings::new(download.path());
    settings.unpack = false;
    let summary = FetchPipeline::new(fetcher, settings)
        .with_verifier(ContentVerifier::new(Manifest::new()).lenient())
        .run(&catalog(), &SelectionFilter::dataset("orex_bennu"))
        .await
        .unwrap();
    assert_eq!(summary.completed, vec!["orex_bennu/seg9"]);
}

#[tokio::test]
async fn test_unknown_dataset_is_a_selection_error() {
    let download = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());

    let err = fetch_pipeline(store.clone(), download.path(), Manifest::new())
        .run(&catalog(), &SelectionFilter::dataset("hayabusa_itokawa"))
        .await
        .unwrap_err();

    assert!(err.is_selection_error());
    assert!(store.call_log().is_empty());
}
