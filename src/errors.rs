//! Error types for AstroVision Sync
//!
//! Each pipeline stage owns an error enum. Every variant that concerns a
//! single transfer item carries the dataset and item names so a fatal error
//! can be traced back to the catalog entry that caused it.

use std::path::PathBuf;
use thiserror::Error;

/// Catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No descriptor exists for the requested partition
    #[error("Catalog not found for partition '{partition}': {path}")]
    NotFound { partition: String, path: PathBuf },

    /// The descriptor does not match the nested-mapping shape
    #[error("Malformed catalog for partition '{partition}': {reason}")]
    Malformed { partition: String, reason: String },

    /// I/O error reading the descriptor
    #[error("I/O error reading catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Selection resolution errors
#[derive(Error, Debug)]
pub enum SelectionError {
    /// The requested dataset does not exist in the partition
    #[error("No dataset named '{dataset}' in the {partition} catalog")]
    DatasetNotFound { partition: String, dataset: String },

    /// The requested cluster or segment does not exist under the dataset
    #[error("No item named '{item}' exists in dataset '{dataset}'")]
    ItemNotFound { dataset: String, item: String },

    /// An item name was given without the dataset that contains it
    #[error("Item '{item}' was requested without a dataset name")]
    MissingDataset { item: String },
}

/// Fetch and publish errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error while reading or writing a transferred file
    #[error("File I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Server returned an error status
    #[error("Server error: HTTP {status} for {url}")]
    ServerError { status: u16, url: String },

    /// Invalid URL built from a locator
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for {url}")]
    MaxRetriesExceeded { max_retries: u32, url: String },

    /// Upload session could not be started
    #[error("Failed to start upload session: {reason}")]
    SessionStart { reason: String },

    /// Appending a chunk to an open upload session failed
    #[error("Failed to append chunk at offset {offset} to session {session_id}: {reason}")]
    Append {
        session_id: String,
        offset: u64,
        reason: String,
    },

    /// Closing an upload session failed
    #[error("Failed to finish upload session {session_id} for {destination}: {reason}")]
    Finish {
        session_id: String,
        destination: String,
        reason: String,
    },

    /// Single-shot upload failed
    #[error("Failed to upload {destination}: {reason}")]
    Upload { destination: String, reason: String },

    /// Temporary download could not be moved into place
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Storage credentials are not configured
    #[error("Missing storage access token. Set {var} or run 'auth setup'")]
    MissingToken { var: String },
}

impl TransferError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Content verification errors
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Downloaded content does not match the recorded digest
    #[error("Checksum mismatch for {dataset}/{item}. Expected: {expected}, got: {actual}")]
    ChecksumMismatch {
        dataset: String,
        item: String,
        expected: String,
        actual: String,
    },

    /// Verification was mandatory but the manifest has no entry
    #[error("No manifest entry for {dataset}/{item}")]
    ManifestEntryMissing { dataset: String, item: String },

    /// File could not be read for hashing
    #[error("Failed to read {path} for hashing")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Archive packaging and extraction errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Archive cannot be opened or an entry cannot be read
    #[error("Corrupt archive {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Source directory is missing or has nothing to package
    #[error("Nothing to package at {path}: {reason}")]
    SourceNotFound { path: PathBuf, reason: String },

    /// I/O error while writing archive contents
    #[error("Archive I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Background archive task panicked or was cancelled
    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Manifest persistence errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("Manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// JSON parsing error
    #[error("JSON error in manifest {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error reading or writing the manifest
    #[error("I/O error on manifest {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid hash format
    #[error("Invalid hash format: {hash}. Expected MD5 hex string")]
    InvalidHash { hash: String },

    /// Another publish run holds the manifest lock
    #[error("Manifest {path} is locked by another publish run (remove {lock_path} if stale)")]
    Locked { path: PathBuf, lock_path: PathBuf },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O error reading the configuration
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Credential management errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token was empty or malformed
    #[error("Invalid access token: {reason}")]
    InvalidToken { reason: String },

    /// File I/O error during credential storage
    #[error("Failed to save credentials to file")]
    CredentialStorage(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Selection error
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Verification error
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Archive error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An item failed while the pipeline was processing it
    #[error("{dataset}/{item}: {source}")]
    Item {
        dataset: String,
        item: String,
        #[source]
        source: Box<AppError>,
    },

    /// One or more items failed in keep-going mode
    #[error("{failed} of {total} items failed")]
    RunFailed { failed: usize, total: usize },

    /// Generic error with context
    #[error("{message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic error with a custom message
    pub fn generic(message: impl Into<String>) -> Self {
        AppError::Generic {
            message: message.into(),
        }
    }

    /// Attach the dataset and item a failure belongs to
    pub fn for_item(dataset: &str, item: &str, source: impl Into<AppError>) -> Self {
        AppError::Item {
            dataset: dataset.to_string(),
            item: item.to_string(),
            source: Box::new(source.into()),
        }
    }

    /// Catalog and selection errors abort the run before any transfer starts
    pub fn is_selection_error(&self) -> bool {
        matches!(self, AppError::Catalog(_) | AppError::Selection(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Catalog(_) => "catalog",
            AppError::Selection(_) => "selection",
            AppError::Transfer(_) => "transfer",
            AppError::Verify(_) => "verification",
            AppError::Archive(_) => "archive",
            AppError::Manifest(_) => "manifest",
            AppError::Config(_) => "config",
            AppError::Auth(_) => "authentication",
            AppError::Item { source, .. } => source.category(),
            AppError::RunFailed { .. } => "run",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Selection result type alias
pub type SelectionResult<T> = std::result::Result<T, SelectionError>;

/// Transfer result type alias
pub type TransferResult<T> = std::result::Result<T, TransferError>;

/// Verification result type alias
pub type VerifyResult<T> = std::result::Result<T, VerifyError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;
