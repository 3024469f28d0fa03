//! Shared HTTP client for registry requests.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use super::error::FetchError;
use crate::user_agent;

/// Timeouts applied to every registry request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout, body included.
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// HTTP client for listing, structured-text and page requests.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client with the given timeouts, gzip and the project User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend or proxy
    /// configuration cannot be initialized.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] / [`FetchError::Network`] on transport failure
    /// - [`FetchError::HttpStatus`] on a non-success status, with Retry-After
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            debug!(status = status.as_u16(), ?retry_after, "non-success response");
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        response.text().await.map_err(|e| transport_error(url, e))
    }

    /// Fetches `base` with `params` and deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidUrl`] if `base` does not parse,
    /// [`FetchError::Parse`] when the body is not the expected JSON, otherwise
    /// as [`HttpClient::get_text`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        base: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = with_query(base, params)?;
        let body = self.get_text(url.as_str()).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::parse(url.as_str(), e))
    }
}

/// Appends `params` to `base`; repeated keys are kept in order.
///
/// # Errors
///
/// [`FetchError::InvalidUrl`] if `base` does not parse.
pub fn with_query(base: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
    Url::parse_with_params(base, params.iter().map(|(k, v)| (*k, v.as_str())))
        .map_err(|_| FetchError::invalid_url(base))
}

fn transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::network(url, error)
    }
}
