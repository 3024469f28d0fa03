//! Pipeline configuration.
//!
//! [`PipelineConfig`] gathers the settings of every stage with their defaults
//! and builds the wired-up components. All stages share one [`HttpClient`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::extract::{ContentExtractor, ContentLimits};
use crate::fetch::{FetchError, HttpClient, HttpSettings, RetryPolicy};
use crate::monitor::MonitorConfig;
use crate::processor::{ParallelProcessor, ProcessorConfig, ProcessorError};
use crate::registry::RegistryEndpoints;
use crate::retriever::{DocumentRetriever, RetrievalSettings};

/// Errors raised while validating configuration or building components.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A timeout or interval was zero.
    #[error("{name} must be greater than zero")]
    ZeroDuration {
        /// Setting name.
        name: &'static str,
    },

    /// Minimum content length exceeds the maximum.
    #[error("minimum content length {min} exceeds maximum {max}")]
    ContentBounds {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Backoff multiplier below 1.0 or not finite.
    #[error("backoff multiplier {value} must be a finite number of at least 1.0")]
    InvalidBackoff {
        /// Configured multiplier.
        value: f64,
    },

    /// Base delay exceeds the delay cap.
    #[error("retry base delay {base:?} exceeds max delay {max:?}")]
    DelayBounds {
        /// Configured base delay.
        base: Duration,
        /// Configured cap.
        max: Duration,
    },

    /// An endpoint is not an absolute http(s) URL.
    #[error("{name} is not an absolute http(s) URL: {value}")]
    InvalidEndpoint {
        /// Endpoint name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Processor settings rejected.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] FetchError),
}

/// Settings for every pipeline stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineConfig {
    /// Request timeouts.
    pub http: HttpSettings,
    /// Retry behavior for every registry request.
    pub retry: RetryPolicy,
    /// Listing pagination and pacing.
    pub retrieval: RetrievalSettings,
    /// Extracted-text bounds and page fallback.
    pub content: ContentLimits,
    /// Parallel processing.
    pub processor: ProcessorConfig,
    /// Resource sampling. The memory limit comes from `processor`.
    pub monitor: MonitorConfig,
    /// Registry base URLs.
    pub endpoints: RegistryEndpoints,
}

impl PipelineConfig {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("connect timeout", self.http.connect_timeout),
            ("request timeout", self.http.request_timeout),
            ("task timeout", self.processor.task_timeout),
            ("monitor interval", self.monitor.interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { name });
            }
        }

        if self.content.min_length > self.content.max_length {
            return Err(ConfigError::ContentBounds {
                min: self.content.min_length,
                max: self.content.max_length,
            });
        }

        let multiplier = self.retry.backoff_multiplier();
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoff { value: multiplier });
        }
        if self.retry.base_delay() > self.retry.max_delay() {
            return Err(ConfigError::DelayBounds {
                base: self.retry.base_delay(),
                max: self.retry.max_delay(),
            });
        }

        check_endpoint("API base", &self.endpoints.api_base)?;
        check_endpoint("site base", &self.endpoints.site_base)?;

        self.processor.validate()?;
        Ok(())
    }

    /// Builds the shared HTTP client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Client`] if the client cannot be built.
    pub fn build_client(&self) -> Result<HttpClient, ConfigError> {
        Ok(HttpClient::new(&self.http)?)
    }

    /// Builds a content extractor around `client`.
    #[must_use]
    pub fn build_extractor(&self, client: HttpClient) -> ContentExtractor {
        ContentExtractor::new(
            client,
            self.retry.clone(),
            self.endpoints.clone(),
            self.content.clone(),
        )
    }

    /// Validates, then builds a retriever and its extractor on one client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on invalid settings or client failure.
    pub fn build_retriever(&self) -> Result<DocumentRetriever, ConfigError> {
        self.validate()?;
        let client = self.build_client()?;
        let extractor = self.build_extractor(client.clone());
        debug!(
            api_base = %self.endpoints.api_base,
            page_size = self.retrieval.page_size(),
            "building document retriever"
        );
        Ok(DocumentRetriever::new(
            client,
            self.retry.clone(),
            self.endpoints.clone(),
            self.retrieval.clone(),
            extractor,
        ))
    }

    /// Builds the parallel processor.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Processor`] on invalid processor settings.
    pub fn build_processor(&self) -> Result<ParallelProcessor, ConfigError> {
        let monitor = MonitorConfig {
            memory_limit_mb: self.processor.memory_limit_mb,
            ..self.monitor.clone()
        };
        Ok(ParallelProcessor::with_monitor_config(
            self.processor.clone(),
            monitor,
        )?)
    }
}

fn check_endpoint(name: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint {
            name,
            value: value.to_string(),
        }),
    }
}
