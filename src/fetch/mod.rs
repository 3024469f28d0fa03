//! HTTP access to the registry with failure classification and retry.
//!
//! # Features
//!
//! - One shared [`HttpClient`] with connect/request timeouts and gzip
//! - Structured [`FetchError`]s carrying the failing URL
//! - [`RetryPolicy`] with exponential backoff, jitter and Retry-After support
//!
//! # Example
//!
//! ```no_run
//! use regfetch_core::fetch::{HttpClient, HttpSettings, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpSettings::default())?;
//! let outcome = RetryPolicy::default()
//!     .execute(|_| client.get_text("https://www.federalregister.gov/documents/full_text/xml/2021-08964.xml"))
//!     .await;
//! println!("attempts: {}", outcome.attempts());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod retry;

pub use client::{HttpClient, HttpSettings, with_query};
pub use constants::{CONNECT_TIMEOUT_SECS, MAX_RETRY_AFTER, REQUEST_TIMEOUT_SECS};
pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryOutcome, RetryPolicy, Retryable,
    classify_error, parse_retry_after,
};
