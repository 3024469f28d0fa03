//! Error types for the fetch module.
//!
//! Every failure carries the URL it happened on so log lines and retry
//! reasons stay attributable.

use thiserror::Error;

/// Errors that can occur while fetching registry resources.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// The URL is malformed or could not be composed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The response body could not be decoded or parsed.
    #[error("failed to parse response from {url}: {message}")]
    Parse {
        /// The URL whose body failed to parse.
        url: String,
        /// Parser error description.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Returns the HTTP status code, if this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let error = FetchError::http_status("https://example.gov/doc.xml", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("https://example.gov/doc.xml"));
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_retry_after_is_carried() {
        let error = FetchError::http_status_with_retry_after(
            "https://example.gov",
            429,
            Some("120".to_string()),
        );
        assert!(matches!(
            error,
            FetchError::HttpStatus { status: 429, retry_after: Some(ref v), .. } if v == "120"
        ));
    }

    #[test]
    fn test_parse_error_display() {
        let error = FetchError::parse("https://example.gov/api", "expected value at line 1");
        assert_eq!(
            error.to_string(),
            "failed to parse response from https://example.gov/api: expected value at line 1"
        );
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_timeout_and_invalid_url_display() {
        assert_eq!(
            FetchError::timeout("https://example.gov").to_string(),
            "timeout fetching https://example.gov"
        );
        assert_eq!(
            FetchError::invalid_url("not a url").to_string(),
            "invalid URL: not a url"
        );
    }
}
