//! Configuration management for AstroVision Sync
//!
//! Settings come from built-in defaults, then the first config file found,
//! then environment overrides. Command-line flags are applied last by the
//! command handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, FetchOptions, HubLocation, PartialPolicy};
use crate::constants::{env as env_constants, files, http, hub, limits, logging, storage, transfer};
use crate::errors::{ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset hub settings
    pub hub: HubConfigToml,
    /// Object storage settings
    pub storage: StorageConfigToml,
    /// Chunking and retention settings
    pub transfer: TransferConfigToml,
    /// Local catalog, manifest and data locations
    pub paths: PathsConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly hub configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfigToml {
    pub endpoint: String,
    pub repo_id: String,
    pub revision: String,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for HubConfigToml {
    fn default() -> Self {
        Self {
            endpoint: hub::DEFAULT_ENDPOINT.to_string(),
            repo_id: hub::DEFAULT_REPO_ID.to_string(),
            revision: hub::DEFAULT_REVISION.to_string(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
        }
    }
}

/// TOML-friendly storage configuration
///
/// The access token is never read from this file; it comes from the
/// environment or `.env`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfigToml {
    pub content_url: String,
}

impl Default for StorageConfigToml {
    fn default() -> Self {
        Self {
            content_url: storage::DEFAULT_CONTENT_URL.to_string(),
        }
    }
}

/// TOML-friendly transfer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfigToml {
    /// Download write buffer in bytes (at least 16 KiB)
    pub fetch_chunk_size: usize,
    /// Upload session chunk in bytes
    pub upload_chunk_size: usize,
    /// Download to `<name>.part` and rename on success
    pub atomic_downloads: bool,
    /// Keep or remove partial files after a failed download
    pub partial_policy: PartialPolicy,
    /// Check downloads against the manifest
    pub verify: bool,
    /// Treat a missing manifest entry as an error
    pub require_manifest_entry: bool,
    /// Keep downloaded archives after extraction
    pub keep_archives: bool,
}

impl Default for TransferConfigToml {
    fn default() -> Self {
        Self {
            fetch_chunk_size: transfer::FETCH_CHUNK_SIZE,
            upload_chunk_size: transfer::UPLOAD_CHUNK_SIZE,
            atomic_downloads: false,
            partial_policy: PartialPolicy::Keep,
            verify: true,
            require_manifest_entry: false,
            keep_archives: true,
        }
    }
}

/// TOML-friendly path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfigToml {
    /// Directory holding `<partition>.json` catalogs
    pub catalog_dir: PathBuf,
    /// Manifest file; defaults to `md5.json` inside the catalog directory
    pub manifest: Option<PathBuf>,
    /// Default local root for downloads
    pub data_root: PathBuf,
}

impl Default for PathsConfigToml {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from(files::DEFAULT_CATALOG_DIR),
            manifest: None,
            data_root: PathBuf::from(files::DEFAULT_DATA_ROOT),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicitly given file must exist. Otherwise `./astrovision-sync.toml`
    /// and then `<config_dir>/astrovision-sync/config.toml` are tried, falling
    /// back to defaults when neither exists.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }.into()),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./astrovision-sync.toml")];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Per-user config file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("astrovision-sync").join("config.toml"))
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(env_constants::HUB_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                debug!("Hub endpoint overridden from environment");
                self.hub.endpoint = endpoint.trim().to_string();
            }
        }
    }

    /// Reject values the transfer engine cannot work with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.hub.rate_limit_rps == 0 {
            return Err(invalid("hub.rate_limit_rps", 0, "must be at least 1"));
        }
        if self.transfer.fetch_chunk_size < transfer::MIN_CHUNK_SIZE {
            return Err(invalid(
                "transfer.fetch_chunk_size",
                self.transfer.fetch_chunk_size,
                &format!("must be at least {} bytes", transfer::MIN_CHUNK_SIZE),
            ));
        }
        if self.transfer.upload_chunk_size < transfer::MIN_CHUNK_SIZE {
            return Err(invalid(
                "transfer.upload_chunk_size",
                self.transfer.upload_chunk_size,
                &format!("must be at least {} bytes", transfer::MIN_CHUNK_SIZE),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(
                "logging.level",
                &self.logging.level,
                "expected one of error, warn, info, debug or trace",
            ));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.hub.request_timeout,
            connect_timeout: self.hub.connect_timeout,
            rate_limit_rps: self.hub.rate_limit_rps,
            ..ClientConfig::default()
        }
    }

    pub fn hub_location(&self) -> HubLocation {
        HubLocation {
            endpoint: self.hub.endpoint.clone(),
            repo_id: self.hub.repo_id.clone(),
            revision: self.hub.revision.clone(),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_chunk_size(self.transfer.fetch_chunk_size)
            .with_atomic(self.transfer.atomic_downloads)
            .with_partial_policy(self.transfer.partial_policy)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.paths
            .manifest
            .clone()
            .unwrap_or_else(|| self.paths.catalog_dir.join(files::MANIFEST_FILE_NAME))
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
