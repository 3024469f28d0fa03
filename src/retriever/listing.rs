//! Paginated metadata listing from the registry JSON API.

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::fetch::{HttpClient, RetryOutcome, RetryPolicy};
use crate::registry::{CitationReference, DocumentMetadata, RegistryEndpoints};

/// Fields requested from the listing API.
const LISTING_FIELDS: [&str; 6] = [
    "document_number",
    "title",
    "publication_date",
    "full_text_xml_url",
    "html_url",
    "cfr_references",
];

/// One page of listing results.
#[derive(Debug, Deserialize)]
pub(crate) struct ListingPage {
    #[serde(default)]
    pub(crate) results: Vec<ListingRecord>,
    #[serde(default)]
    pub(crate) count: Option<u64>,
    #[serde(default)]
    pub(crate) total_pages: Option<u32>,
}

/// A listing record as the API reports it; every field may be absent.
#[derive(Debug, Deserialize)]
pub(crate) struct ListingRecord {
    document_number: Option<String>,
    title: Option<String>,
    publication_date: Option<String>,
    full_text_xml_url: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    cfr_references: Option<Vec<CitationReference>>,
}

impl ListingRecord {
    /// Converts to metadata, dropping records without an identifier or title.
    fn into_metadata(self) -> Option<DocumentMetadata> {
        let identifier = self.document_number.filter(|v| !v.trim().is_empty())?;
        let Some(title) = self.title.filter(|v| !v.trim().is_empty()) else {
            debug!(identifier, "dropping listing record without title");
            return None;
        };
        Some(DocumentMetadata {
            identifier,
            title,
            publication_date: self.publication_date,
            structured_url: self.full_text_xml_url,
            page_url: self.html_url,
            citations: self.cfr_references.unwrap_or_default(),
        })
    }
}

/// Result of walking the listing pages for one agency.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    pub(crate) records: Vec<DocumentMetadata>,
    pub(crate) pages_fetched: u32,
    pub(crate) aborted: bool,
}

pub(crate) fn listing_params(agency: &str, page_size: u32, page: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("conditions[agencies][]", agency.to_string()),
        ("order", "newest".to_string()),
        ("per_page", page_size.to_string()),
        ("page", page.to_string()),
    ];
    params.extend(LISTING_FIELDS.iter().map(|field| ("fields[]", (*field).to_string())));
    params
}

/// Walks listing pages until one is empty, `limit` is reached, or the
/// reported page count runs out. A page that cannot be fetched, or a
/// cancelled `token`, ends the walk and keeps what was accumulated.
#[allow(clippy::too_many_arguments)]
#[instrument(skip(client, retry, endpoints, token), fields(agency = %agency))]
pub(crate) async fn fetch_listing(
    client: &HttpClient,
    retry: &RetryPolicy,
    endpoints: &RegistryEndpoints,
    agency: &str,
    limit: Option<usize>,
    page_size: u32,
    page_delay: Duration,
    token: &CancellationToken,
) -> Listing {
    let url = endpoints.listing_url();
    let mut listing = Listing::default();
    let mut page = 1u32;

    loop {
        if page > 1 && !super::pause(token, page_delay).await {
            debug!(page, "listing cancelled");
            break;
        }

        let params = listing_params(agency, page_size, page);
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(page, "listing cancelled");
                break;
            }
            outcome = retry.execute(|_| client.get_json::<ListingPage>(&url, &params)) => outcome,
        };
        let body = match outcome {
            RetryOutcome::Success { value, .. } => value,
            failed => {
                warn!(
                    page,
                    attempts = failed.attempts(),
                    reason = failed.failure_reason().unwrap_or_default(),
                    kept = listing.records.len(),
                    "listing page failed, keeping partial results"
                );
                listing.aborted = true;
                break;
            }
        };
        listing.pages_fetched += 1;

        if body.results.is_empty() {
            debug!(page, "empty listing page");
            break;
        }

        let received = body.results.len();
        listing
            .records
            .extend(body.results.into_iter().filter_map(ListingRecord::into_metadata));
        debug!(
            page,
            received,
            total = listing.records.len(),
            reported_count = body.count,
            "listing page fetched"
        );

        if let Some(limit) = limit {
            if listing.records.len() >= limit {
                listing.records.truncate(limit);
                break;
            }
        }

        if body.total_pages.is_some_and(|total| page >= total) {
            break;
        }
        page += 1;
    }

    info!(
        records = listing.records.len(),
        pages = listing.pages_fetched,
        aborted = listing.aborted,
        "listing complete"
    );
    listing
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_params() {
        let params = listing_params("environmental-protection-agency", 100, 2);
        assert!(params.contains(&(
            "conditions[agencies][]",
            "environmental-protection-agency".to_string()
        )));
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("per_page", "100".to_string())));
        assert!(params.contains(&("order", "newest".to_string())));
        assert_eq!(params.iter().filter(|(k, _)| *k == "fields[]").count(), 6);
    }

    #[test]
    fn test_listing_page_deserializes() {
        let page: ListingPage = serde_json::from_str(
            r#"{
                "count": 2,
                "total_pages": 1,
                "results": [
                    {
                        "document_number": "2021-08964",
                        "title": "Air Plan Approval",
                        "publication_date": "2021-04-29",
                        "full_text_xml_url": "https://www.federalregister.gov/documents/full_text/xml/2021/04/29/2021-08964.xml",
                        "html_url": "https://www.federalregister.gov/documents/2021/04/29/2021-08964/air-plan-approval",
                        "cfr_references": [{"title": 40, "part": 52, "citation": "40 CFR 52"}]
                    },
                    {"document_number": "2021-08965", "title": null}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(page.total_pages, Some(1));
        let records: Vec<_> = page
            .results
            .into_iter()
            .filter_map(ListingRecord::into_metadata)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_citation(), Some("40 CFR 52"));
        assert_eq!(records[0].publication_date.as_deref(), Some("2021-04-29"));
    }

    #[test]
    fn test_listing_page_tolerates_missing_results() {
        let page: ListingPage = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, None);
    }
}
