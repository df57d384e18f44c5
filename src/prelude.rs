//! Prelude module for the AstroVision Sync library
//!
//! Re-exports the items most integrations need, so a single
//! `use astrovision_sync::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use astrovision_sync::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let catalog = CatalogStore::new(&config.paths.catalog_dir)
//!         .load(Partition::Segments)
//!         .await?;
//!
//!     let hub = HubClient::new(config.hub_location(), &config.client_config())?;
//!     let fetcher = Fetcher::new(Arc::new(hub), config.fetch_options());
//!     let pipeline = FetchPipeline::new(fetcher, FetchSettings::new(&config.paths.data_root));
//!
//!     let summary = pipeline
//!         .run(&catalog, &SelectionFilter::dataset("orex_bennu"))
//!         .await?;
//!     println!("{}", summary.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

pub use crate::config::AppConfig;

// Catalog and selection
pub use crate::app::{
    resolve, Catalog, CatalogStore, Partition, SelectionFilter, Split, TransferItem,
};

// Transfer engine and remote services
pub use crate::app::{
    ClientConfig, DropboxClient, FetchOptions, Fetcher, HubClient, HubLocation, ObjectSource,
    ProgressCallback, Publisher, UploadSink,
};

// Integrity and manifest
pub use crate::app::{hash_file, ContentVerifier, HexDigest, Manifest, ManifestStore};

// Pipelines
pub use crate::app::{
    FailureMode, FetchPipeline, FetchSettings, PublishPipeline, PublishSettings, RunSummary,
};
