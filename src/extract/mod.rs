//! Document text extraction with format fallback.
//!
//! Strategies run in order with early exit: structured full text first, then
//! the page view when fallback is enabled. Each fetch goes through the retry
//! executor; every result passes the same length validation.

mod normalize;
mod page;
mod structured;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use normalize::{
    ContentLimits, DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_MIN_CONTENT_LENGTH, ValidatedText,
    normalize_whitespace, validate_content,
};
pub use page::parse_page_text;
pub use structured::parse_structured_text;

pub use crate::registry::ContentSource;
use crate::fetch::{HttpClient, RetryOutcome, RetryPolicy};
use crate::registry::{DocumentMetadata, RegistryEndpoints, build_page_url, build_structured_url};

/// Normalized text recovered for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedContent {
    /// Normalized text, at most the configured maximum length.
    pub text: String,
    /// Format that produced the text.
    pub source: ContentSource,
    /// URL the text was fetched from.
    pub url: String,
    /// Character count before truncation.
    pub original_length: usize,
    /// Whether the text was cut to the maximum length.
    pub truncated: bool,
}

impl ExtractedContent {
    /// Character count of the (possibly truncated) text.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// True if the text is empty. Validation makes this unreachable in practice.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

const ALL_STRATEGIES: [ContentSource; 2] = [ContentSource::Structured, ContentSource::PageScrape];

/// Fetches and parses document text.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    client: HttpClient,
    retry: RetryPolicy,
    endpoints: RegistryEndpoints,
    limits: ContentLimits,
}

impl ContentExtractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new(
        client: HttpClient,
        retry: RetryPolicy,
        endpoints: RegistryEndpoints,
        limits: ContentLimits,
    ) -> Self {
        Self {
            client,
            retry,
            endpoints,
            limits,
        }
    }

    /// Returns the content limits in use.
    #[must_use]
    pub fn limits(&self) -> &ContentLimits {
        &self.limits
    }

    fn strategies(&self) -> &'static [ContentSource] {
        if self.limits.page_fallback {
            &ALL_STRATEGIES
        } else {
            &ALL_STRATEGIES[..1]
        }
    }

    /// Extracts text for `metadata`, or `None` when every strategy fails.
    #[instrument(skip(self, metadata), fields(identifier = %metadata.identifier))]
    pub async fn extract(&self, metadata: &DocumentMetadata) -> Option<ExtractedContent> {
        for &source in self.strategies() {
            if let Some(content) = self.try_strategy(source, metadata).await {
                info!(
                    source = %content.source,
                    length = content.len(),
                    truncated = content.truncated,
                    "extracted content"
                );
                return Some(content);
            }
            debug!(%source, "strategy produced no usable text");
        }

        warn!("all extraction strategies failed");
        None
    }

    async fn try_strategy(
        &self,
        source: ContentSource,
        metadata: &DocumentMetadata,
    ) -> Option<ExtractedContent> {
        let url = match source {
            ContentSource::Structured => build_structured_url(metadata, &self.endpoints),
            ContentSource::PageScrape => build_page_url(metadata, &self.endpoints),
        }?;

        let body = match self.retry.execute(|_| self.client.get_text(&url)).await {
            RetryOutcome::Success { value, .. } => value,
            outcome => {
                debug!(
                    url = %url,
                    attempts = outcome.attempts(),
                    reason = outcome.failure_reason().unwrap_or_default(),
                    "fetch failed"
                );
                return None;
            }
        };

        let text = match source {
            ContentSource::Structured => match parse_structured_text(&body) {
                Ok(text) => text,
                Err(e) => {
                    debug!(url = %url, error = %e, "structured text did not parse");
                    return None;
                }
            },
            ContentSource::PageScrape => parse_page_text(&body)?,
        };

        let validated = validate_content(&text, &self.limits)?;
        Some(ExtractedContent {
            text: validated.text,
            source,
            url,
            original_length: validated.original_length,
            truncated: validated.truncated,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::fetch::HttpSettings;

    const LONG_PARAGRAPH: &str = "The Administrator finalizes amendments to the national emission standards for hazardous air pollutants.";

    fn extractor(server: &MockServer, limits: ContentLimits) -> ContentExtractor {
        ContentExtractor::new(
            HttpClient::new(&HttpSettings::default()).unwrap(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2), 2.0),
            RegistryEndpoints::with_site_base(&server.uri()),
            limits,
        )
    }

    #[tokio::test]
    async fn test_structured_success_skips_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/full_text/xml/2021-08964.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(format!("<RULE><P>{LONG_PARAGRAPH}</P></RULE>")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/2021-08964"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let content = extractor(&server, ContentLimits::default())
            .extract(&DocumentMetadata::new("2021-08964", "Title"))
            .await
            .unwrap();
        assert_eq!(content.source, ContentSource::Structured);
        assert_eq!(content.text, LONG_PARAGRAPH);
        assert!(content.url.ends_with("/documents/full_text/xml/2021-08964.xml"));
    }

    #[tokio::test]
    async fn test_short_structured_text_falls_back_to_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/full_text/xml/2021-08964.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<RULE><P>tiny</P></RULE>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/2021-08964"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<html><body><div class=\"full-text\">{LONG_PARAGRAPH}</div></body></html>"
            )))
            .mount(&server)
            .await;

        let content = extractor(&server, ContentLimits::default())
            .extract(&DocumentMetadata::new("2021-08964", "Title"))
            .await
            .unwrap();
        assert_eq!(content.source, ContentSource::PageScrape);
    }

    #[tokio::test]
    async fn test_fallback_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/full_text/xml/2021-08964.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/2021-08964"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let limits = ContentLimits {
            page_fallback: false,
            ..ContentLimits::default()
        };
        let content = extractor(&server, limits)
            .extract(&DocumentMetadata::new("2021-08964", "Title"))
            .await;
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn test_invalid_identifier_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let content = extractor(&server, ContentLimits::default())
            .extract(&DocumentMetadata::new("not-an-id", "Title"))
            .await;
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn test_truncation_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/full_text/xml/2021-08964.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<RULE><P>{}</P></RULE>", LONG_PARAGRAPH.repeat(5))),
            )
            .mount(&server)
            .await;

        let limits = ContentLimits {
            max_length: 120,
            ..ContentLimits::default()
        };
        let content = extractor(&server, limits)
            .extract(&DocumentMetadata::new("2021-08964", "Title"))
            .await
            .unwrap();
        assert!(content.truncated);
        assert_eq!(content.len(), 120);
        assert!(content.original_length > 120);
    }
}
