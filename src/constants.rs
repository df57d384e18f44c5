//! Application constants for AstroVision Sync
//!
//! Centralizes the constants used throughout the application, organized by
//! functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Bearer token for the object-storage upload service
    pub const STORAGE_TOKEN: &str = "ASTROVISION_STORAGE_TOKEN";

    /// Optional override for the dataset hub endpoint
    pub const HUB_ENDPOINT: &str = "ASTROVISION_HUB_ENDPOINT";
}

/// Credential file handling
pub mod auth {
    /// File permissions for .env file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const ENV_FILE_PERMISSIONS: u32 = 0o600;

    /// Shortest token accepted by `auth setup`
    pub const MIN_TOKEN_LENGTH: usize = 16;
}

/// Dataset hub defaults
pub mod hub {
    /// Hub base URL
    pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

    /// Repository holding the dataset archives
    pub const DEFAULT_REPO_ID: &str = "travisdriver/astrovision-data";

    /// Branch or commit to resolve files against
    pub const DEFAULT_REVISION: &str = "main";
}

/// Object storage defaults
pub mod storage {
    /// Content endpoint for uploads
    pub const DEFAULT_CONTENT_URL: &str = "https://content.dropboxapi.com/2";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("AstroVision-Sync/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout; large archives need a generous limit
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
}

/// Rate limiting and retry configuration for hub requests
pub mod limits {
    /// Default rate limit for hub requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 5;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
}

/// Chunking for transfers and hashing
pub mod transfer {
    /// Smallest allowed fetch chunk
    pub const MIN_CHUNK_SIZE: usize = 16 * 1024;

    /// Write buffer size for streamed downloads
    pub const FETCH_CHUNK_SIZE: usize = 64 * 1024;

    /// Chunk size for session uploads
    pub const UPLOAD_CHUNK_SIZE: usize = 2 * 32 * 1024;

    /// Read block size for content hashing
    pub const HASH_BLOCK_SIZE: usize = 1024 * 1024;
}

/// File naming
pub mod files {
    /// Suffix for in-progress downloads when atomic downloads are on
    pub const PARTIAL_FILE_SUFFIX: &str = ".part";

    /// Temporary file suffix for manifest rewrites
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix of the publish lock next to the manifest
    pub const LOCK_FILE_SUFFIX: &str = ".lock";

    /// Archive extension (without the dot)
    pub const ARCHIVE_EXTENSION: &str = "zip";

    /// Default catalog directory
    pub const DEFAULT_CATALOG_DIR: &str = "lists";

    /// Default manifest file name inside the catalog directory
    pub const MANIFEST_FILE_NAME: &str = "md5.json";

    /// Default local data root
    pub const DEFAULT_DATA_ROOT: &str = "data";

    /// Credential file in the working directory
    pub const ENV_FILE: &str = ".env";
}

/// Logging defaults
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Flat re-exports for the most common values
pub use env::STORAGE_TOKEN as ENV_STORAGE_TOKEN;
pub use http::USER_AGENT;
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use transfer::{FETCH_CHUNK_SIZE, HASH_BLOCK_SIZE, UPLOAD_CHUNK_SIZE};
