//! AstroVision Sync Library
//!
//! Catalog-driven synchronization of the AstroVision planetary imagery
//! dataset: resolve a selection of datasets, clusters or segments, stream the
//! archives from the dataset hub with MD5 verification, and publish locally
//! produced results through chunked uploads while maintaining the checksum
//! manifest.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(ENV_STORAGE_TOKEN, "ASTROVISION_STORAGE_TOKEN");
        assert!(USER_AGENT.contains("AstroVision-Sync"));
        assert_eq!(FETCH_CHUNK_SIZE, 65536);
    }

    #[test]
    fn test_error_types() {
        let error = errors::SelectionError::MissingDataset {
            item: "00000007".to_string(),
        };
        let app_error = AppError::from(error);

        assert_eq!(app_error.category(), "selection");
        assert!(app_error.is_selection_error());
    }
}
