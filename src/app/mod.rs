//! Core application logic for AstroVision Sync
//!
//! This module contains the catalog and selection logic, the transfer engine,
//! integrity checking, archive handling and the pipelines that tie them
//! together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use astrovision_sync::app::{
//!     CatalogStore, ClientConfig, FetchOptions, FetchPipeline, FetchSettings, Fetcher,
//!     HubClient, HubLocation, Partition, SelectionFilter,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = CatalogStore::new("lists").load(Partition::Clusters).await?;
//! let hub = HubClient::new(HubLocation::default(), &ClientConfig::default())?;
//!
//! let fetcher = Fetcher::new(Arc::new(hub), FetchOptions::default());
//! let pipeline = FetchPipeline::new(fetcher, FetchSettings::new("data"));
//!
//! let filter = SelectionFilter::dataset("dawn_vesta").with_cluster("00000007");
//! let summary = pipeline.run(&catalog, &filter).await?;
//! println!("{}", summary.summary());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod catalog;
pub mod client;
pub mod hash;
pub mod manifest;
pub mod models;
pub mod pipeline;
pub mod selection;
pub mod transfer;
pub mod verify;

// Re-export main public API
pub use catalog::{Catalog, CatalogStore};
pub use client::{ClientConfig, DropboxClient, HubClient, HubLocation};
pub use hash::HexDigest;
pub use manifest::{Manifest, ManifestStore, PublishLock};
pub use models::{Partition, RemoteLocator, Split, TransferItem};
pub use pipeline::{
    FailureMode, FetchPipeline, FetchSettings, PublishPipeline, PublishSettings, RunSummary,
};
pub use selection::{resolve, SelectionFilter};
pub use transfer::{
    FetchOptions, Fetcher, NoProgress, ObjectSource, PartialPolicy, ProgressCallback,
    ProgressFactory, Publisher, TransferProgress, UploadSink,
};
pub use verify::{hash_file, ContentVerifier};
