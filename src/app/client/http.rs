//! Core HTTP operations with rate limiting and retry logic
//!
//! Hub requests pass through a governor rate limiter and are retried with
//! exponential backoff on connection errors, 429 and 503 responses.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::constants::limits;
use crate::errors::{ConfigError, TransferError, TransferResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `rate_limit_rps` is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> Result<Self, ConfigError> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> Result<DirectRateLimiter, ConfigError> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "hub.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Sends a GET request with rate limiting and retry logic
    ///
    /// The response is returned unread so the body can be streamed. Non-success
    /// statuses other than 429/503 are returned as `ServerError` without retry.
    pub async fn get_response(&self, url: &Url) -> TransferResult<reqwest::Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut retries = 0;
        loop {
            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        if retries < limits::MAX_RETRIES {
                            retries += 1;
                            let delay = backoff_delay(retries);
                            tracing::warn!(
                                "Hub responded {} for {}. Backing off for {}ms",
                                status.as_u16(),
                                url,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                            TransferError::RateLimitExceeded
                        } else {
                            TransferError::ServerOverloaded
                        });
                    }

                    if !status.is_success() {
                        return Err(TransferError::ServerError {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    tracing::debug!("Opened response for {}", url);
                    return Ok(response);
                }
                Err(e) if retries < limits::MAX_RETRIES => {
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        limits::MAX_RETRIES,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Request to {} failed after {} retries: {}",
                        url,
                        limits::MAX_RETRIES,
                        e
                    );
                    return Err(TransferError::MaxRetriesExceeded {
                        max_retries: limits::MAX_RETRIES,
                        url: url.to_string(),
                    });
                }
            }
        }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(limits::RETRY_BASE_DELAY_MS * 2_u64.pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        match HttpHandler::build_rate_limiter(0) {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "hub.rate_limit_rps")
            }
            other => panic!("Expected InvalidValue, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_http_handler_creation() {
        let config = ClientConfig::default();
        let client = config.build_http_client().unwrap();
        assert!(HttpHandler::new(client, 5).is_ok());
    }

    #[test]
    fn test_exponential_backoff() {
        assert_eq!(backoff_delay(1).as_millis(), 2000);
        assert_eq!(backoff_delay(2).as_millis(), 4000);
        assert_eq!(backoff_delay(3).as_millis(), 8000);
    }
}
