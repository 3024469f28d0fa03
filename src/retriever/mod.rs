//! Agency document retrieval: listing, fallback discovery and extraction.
//!
//! # Overview
//!
//! [`DocumentRetriever::fetch_agency_documents`] lists metadata through the
//! JSON API ([`listing`]), falls back to the public search page
//! ([`search_page`]) only when the API produced nothing, then extracts text
//! for each record in turn. Document-level failures are dropped; a failed
//! listing page keeps the records gathered so far. Cancelling the token given
//! to [`DocumentRetriever::with_cancellation`] stops the walk at the next
//! request or pause and keeps what was gathered.

mod listing;
mod search_page;

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use search_page::parse_search_results;

use crate::extract::ContentExtractor;
use crate::fetch::{HttpClient, RetryPolicy};
use crate::registry::{Document, DocumentMetadata, RegistryEndpoints};

/// Default listing page size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the listing API accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default delay between listing pages and between document extractions.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Pagination and pacing for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalSettings {
    /// Records per listing page, within `1..=1000`.
    page_size: u32,
    /// Pause between listing page requests.
    pub page_delay: Duration,
    /// Pause between document extractions.
    pub document_delay: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_REQUEST_DELAY,
            document_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

impl RetrievalSettings {
    /// Creates settings; `page_size` is clamped to `1..=1000`.
    #[must_use]
    pub fn new(page_size: u32, page_delay: Duration, document_delay: Duration) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            page_delay,
            document_delay,
        }
    }

    /// Records per listing page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Counters describing one agency retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalSummary {
    /// Agency slug.
    pub agency: String,
    /// Metadata records available after trimming to the limit.
    pub listed: usize,
    /// Extractions attempted.
    pub attempted: usize,
    /// Documents with usable text.
    pub succeeded: usize,
    /// Extractions that produced nothing.
    pub failed: usize,
    /// Listing pages fetched successfully.
    pub pages_fetched: u32,
    /// Whether a listing page failed and the walk stopped early.
    pub listing_aborted: bool,
    /// Whether metadata came from the search page.
    pub used_fallback: bool,
    /// Whether cancellation stopped the retrieval early.
    pub interrupted: bool,
}

/// Documents plus the summary for one agency.
#[derive(Debug, Clone, Default)]
pub struct AgencyRetrieval {
    /// Documents with text, in listing order.
    pub documents: Vec<Document>,
    /// Retrieval counters.
    pub summary: RetrievalSummary,
}

/// Retrieves documents for an agency.
#[derive(Debug, Clone)]
pub struct DocumentRetriever {
    client: HttpClient,
    retry: RetryPolicy,
    endpoints: RegistryEndpoints,
    settings: RetrievalSettings,
    extractor: ContentExtractor,
    cancel: CancellationToken,
}

impl DocumentRetriever {
    /// Creates a retriever. The extractor should share `client`.
    #[must_use]
    pub fn new(
        client: HttpClient,
        retry: RetryPolicy,
        endpoints: RegistryEndpoints,
        settings: RetrievalSettings,
        extractor: ContentExtractor,
    ) -> Self {
        Self {
            client,
            retry,
            endpoints,
            settings,
            extractor,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops retrieval when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the pacing settings.
    #[must_use]
    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Fetches up to `limit` documents with text for `agency`.
    ///
    /// Never returns more than `limit` documents. `None` means no limit.
    pub async fn fetch_agency_documents(&self, agency: &str, limit: Option<usize>) -> Vec<Document> {
        self.retrieve_agency(agency, limit).await.documents
    }

    /// Lists metadata for `agency`, using the search page only when the API
    /// yields nothing.
    ///
    /// Returns the records, trimmed to `limit`, and a summary with the listing
    /// counters filled in.
    pub async fn list_metadata(
        &self,
        agency: &str,
        limit: Option<usize>,
    ) -> (Vec<DocumentMetadata>, RetrievalSummary) {
        let mut summary = RetrievalSummary {
            agency: agency.to_string(),
            ..RetrievalSummary::default()
        };
        if limit == Some(0) {
            return (Vec::new(), summary);
        }

        let listing = listing::fetch_listing(
            &self.client,
            &self.retry,
            &self.endpoints,
            agency,
            limit,
            self.settings.page_size,
            self.settings.page_delay,
            &self.cancel,
        )
        .await;
        summary.pages_fetched = listing.pages_fetched;
        summary.listing_aborted = listing.aborted;

        let mut records = listing.records;
        if records.is_empty() && !self.cancel.is_cancelled() {
            info!(agency, "listing API returned nothing, trying search page");
            let fallback = search_page::fetch_search_page(
                &self.client,
                &self.retry,
                &self.endpoints,
                agency,
                limit,
            );
            records = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Vec::new(),
                records = fallback => records,
            };
            summary.used_fallback = true;
        }
        summary.interrupted = self.cancel.is_cancelled();

        if let Some(limit) = limit {
            records.truncate(limit);
        }
        summary.listed = records.len();
        (records, summary)
    }

    /// Like [`DocumentRetriever::fetch_agency_documents`], also returning the summary.
    #[instrument(skip(self), fields(agency = %agency))]
    pub async fn retrieve_agency(&self, agency: &str, limit: Option<usize>) -> AgencyRetrieval {
        let (records, mut summary) = self.list_metadata(agency, limit).await;

        let total = records.len();
        let mut documents = Vec::with_capacity(total);
        for (index, metadata) in records.into_iter().enumerate() {
            if index > 0 && !pause(&self.cancel, self.settings.document_delay).await {
                summary.interrupted = true;
                break;
            }
            debug!(
                identifier = %metadata.identifier,
                position = index + 1,
                total,
                "extracting document"
            );

            let extracted = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    summary.interrupted = true;
                    break;
                }
                extracted = self.extractor.extract(&metadata) => extracted,
            };
            summary.attempted += 1;
            match extracted {
                Some(content) => {
                    summary.succeeded += 1;
                    documents.push(Document::new(metadata, agency, content.text, content.source));
                }
                None => summary.failed += 1,
            }
        }

        if summary.interrupted {
            warn!(
                agency,
                kept = documents.len(),
                "retrieval interrupted, keeping documents gathered so far"
            );
        }
        info!(
            agency,
            listed = summary.listed,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            pages_fetched = summary.pages_fetched,
            listing_aborted = summary.listing_aborted,
            used_fallback = summary.used_fallback,
            interrupted = summary.interrupted,
            "agency retrieval complete"
        );
        AgencyRetrieval { documents, summary }
    }
}

/// Sleeps for `delay`; returns `false` if `token` was cancelled first.
async fn pause(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_clamped() {
        let zero = RetrievalSettings::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(zero.page_size(), 1);
        let huge = RetrievalSettings::new(5000, Duration::ZERO, Duration::ZERO);
        assert_eq!(huge.page_size(), MAX_PAGE_SIZE);
        let normal = RetrievalSettings::new(250, Duration::ZERO, Duration::ZERO);
        assert_eq!(normal.page_size(), 250);
    }

    #[tokio::test]
    async fn test_pause_returns_early_on_cancel() {
        let token = CancellationToken::new();
        assert!(pause(&token, Duration::from_millis(1)).await);
        token.cancel();
        let started = std::time::Instant::now();
        assert!(!pause(&token, Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_default_settings() {
        let settings = RetrievalSettings::default();
        assert_eq!(settings.page_size(), 100);
        assert_eq!(settings.page_delay, Duration::from_secs(1));
        assert_eq!(settings.document_delay, Duration::from_secs(1));
    }
}
