//! HTTP adapters for the remote services
//!
//! - [`HubClient`] reads archives from the dataset hub and implements
//!   [`ObjectSource`]
//! - [`storage::DropboxClient`] writes archives to object storage and
//!   implements [`crate::app::transfer::UploadSink`]
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Rate-limited GET with exponential backoff
//! - `storage`: Session-based upload API

use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

use crate::app::models::RemoteLocator;
use crate::app::transfer::{ObjectSource, RemoteObject};
use crate::constants::hub;
use crate::errors::{ConfigError, TransferError, TransferResult};

pub mod config;
pub mod http;
pub mod storage;

pub use config::ClientConfig;
pub use storage::DropboxClient;

use http::HttpHandler;

/// Where archives are read from on the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubLocation {
    pub endpoint: String,
    pub repo_id: String,
    pub revision: String,
}

impl Default for HubLocation {
    fn default() -> Self {
        Self {
            endpoint: hub::DEFAULT_ENDPOINT.to_string(),
            repo_id: hub::DEFAULT_REPO_ID.to_string(),
            revision: hub::DEFAULT_REVISION.to_string(),
        }
    }
}

/// Read-only client for the dataset hub
///
/// Hub paths resolve to `<endpoint>/datasets/<repo_id>/resolve/<revision>/<path>`.
/// URL locators are fetched as they are.
#[derive(Debug)]
pub struct HubClient {
    http_handler: HttpHandler,
    endpoint: Url,
    repo_id: String,
    revision: String,
}

impl HubClient {
    /// Creates a hub client
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the endpoint is not a URL or the rate limit
    /// is zero, and `TransferError` if the HTTP client cannot be built
    pub fn new(location: HubLocation, config: &ClientConfig) -> crate::errors::Result<Self> {
        let endpoint = Url::parse(&location.endpoint).map_err(|e| ConfigError::InvalidValue {
            field: "hub.endpoint".to_string(),
            value: location.endpoint.clone(),
            reason: e.to_string(),
        })?;
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps)?;

        tracing::info!(
            "Created hub client for {} at {} ({})",
            location.repo_id,
            endpoint,
            location.revision
        );

        Ok(Self {
            http_handler,
            endpoint,
            repo_id: location.repo_id,
            revision: location.revision,
        })
    }

    /// URL a locator is downloaded from
    pub fn resolve_url(&self, locator: &RemoteLocator) -> TransferResult<Url> {
        let raw = match locator {
            RemoteLocator::HubPath(path) => format!(
                "{}/datasets/{}/resolve/{}/{}",
                self.endpoint.as_str().trim_end_matches('/'),
                self.repo_id,
                self.revision,
                path.trim_start_matches('/')
            ),
            RemoteLocator::Url(url) => url.clone(),
        };

        Url::parse(&raw).map_err(|e| TransferError::InvalidUrl {
            url: raw,
            error: e.to_string(),
        })
    }

    /// Get the hub endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ObjectSource for HubClient {
    async fn open(&self, locator: &RemoteLocator) -> TransferResult<RemoteObject> {
        let url = self.resolve_url(locator)?;
        let response = self.http_handler.get_response(&url).await?;
        let content_length = response.content_length();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransferError::from))
            .boxed();

        Ok(RemoteObject {
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HubClient {
        HubClient::new(HubLocation::default(), &ClientConfig::default()).unwrap()
    }

    #[test]
    fn test_hub_path_resolution() {
        let url = client()
            .resolve_url(&RemoteLocator::HubPath(
                "segments/orex_bennu/seg1.zip".to_string(),
            ))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://huggingface.co/datasets/travisdriver/astrovision-data/resolve/main/segments/orex_bennu/seg1.zip"
        );
    }

    #[test]
    fn test_direct_url_is_kept() {
        let locator = RemoteLocator::Url("https://example.org/archives/seg1.zip".to_string());
        let url = client().resolve_url(&locator).unwrap();
        assert_eq!(url.as_str(), "https://example.org/archives/seg1.zip");

        let bad = RemoteLocator::Url("not a url".to_string());
        assert!(matches!(
            client().resolve_url(&bad),
            Err(TransferError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let location = HubLocation {
            endpoint: "http://localhost:8080/".to_string(),
            revision: "v1".to_string(),
            ..Default::default()
        };
        let client = HubClient::new(location, &ClientConfig::default()).unwrap();
        let url = client
            .resolve_url(&RemoteLocator::HubPath("dawn_vesta/00000007.zip".to_string()))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/datasets/travisdriver/astrovision-data/resolve/v1/dawn_vesta/00000007.zip"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let location = HubLocation {
            endpoint: "::not a url".to_string(),
            ..Default::default()
        };
        let result = HubClient::new(location, &ClientConfig::default());
        assert!(matches!(
            result,
            Err(crate::errors::AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
