//! HTTP transport abstraction for testability.

use std::future::Future;
use std::time::Duration;

use tracing::{trace, warn};

use super::types::FetchError;

/// Default User-Agent string for HTTP requests.
const DEFAULT_USER_AGENT: &str = concat!("marketmesh/", env!("CARGO_PKG_VERSION"));

/// Trait for the raw HTTP GET the fetch client performs.
///
/// This abstraction allows dependency injection: production code uses
/// [`ReqwestFetcher`], tests substitute scripted transports and assert on
/// call counts.
pub trait HttpFetcher: Send + Sync {
    /// Performs an async HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes, or a transient error.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Real HTTP transport backed by a pooled reqwest client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a transport with the given per-request timeout.
    ///
    /// The client keeps idle connections warm because one query hits the
    /// same artifact host several times in quick succession.
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Transient {
                url: String::new(),
                cause: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!(url, "HTTP GET starting");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            FetchError::Transient {
                url: url.to_string(),
                cause: format!("request failed: {}", e),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "HTTP error status");
            return Err(FetchError::Transient {
                url: url.to_string(),
                cause: format!("HTTP {}", status),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url, error = %e, "failed to read response body");
                Err(FetchError::Transient {
                    url: url.to_string(),
                    cause: format!("failed to read response: {}", e),
                })
            }
        }
    }
}
