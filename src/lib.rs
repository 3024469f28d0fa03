//! Regfetch Core Library
//!
//! This library retrieves regulatory documents from the Federal Register and
//! prepares them for downstream text analysis.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`registry`] - Document identifiers, metadata and URL construction
//! - [`fetch`] - HTTP client, error classification and retry with backoff
//! - [`extract`] - Structured-text and page-view extraction with fallback
//! - [`retriever`] - Paginated agency listing and document retrieval
//! - [`monitor`] - Background memory/CPU sampling
//! - [`processor`] - Bounded parallel processing with task-level retry
//! - [`config`] - Aggregated settings and component construction

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod extract;
pub mod fetch;
pub mod monitor;
pub mod processor;
pub mod registry;
pub mod retriever;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, PipelineConfig};
pub use extract::{ContentExtractor, ContentLimits, ExtractedContent};
pub use fetch::{
    DEFAULT_MAX_RETRIES, FailureType, FetchError, HttpClient, HttpSettings, RetryDecision,
    RetryOutcome, RetryPolicy, classify_error,
};
pub use monitor::{MonitorConfig, ResourceMonitor, ResourceSnapshot};
pub use processor::{
    DocumentOperation, FailureReason, ParallelProcessor, ProcessingReport, ProcessorConfig,
    ProcessorError, ProgressSink, ProgressUpdate, operation_fn,
};
pub use registry::{ContentSource, Document, DocumentMetadata, RegistryEndpoints};
pub use retriever::{DocumentRetriever, RetrievalSettings, RetrievalSummary};
