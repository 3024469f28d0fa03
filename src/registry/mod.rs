//! Registry document model, identifier validation and URL construction.
//!
//! # Overview
//!
//! - [`identifier`] - the four accepted identifier shapes
//! - [`urls`] - structured-text and page URL builders
//!
//! [`DocumentMetadata`] is what a listing yields; [`Document`] is metadata plus
//! extracted text, the unit the processor consumes.

pub mod identifier;
pub mod urls;

use serde::{Deserialize, Deserializer, Serialize};

pub use identifier::{
    IdentifierShape, classify_identifier, identifier_from_url, publication_date_from_url,
    validate_identifier,
};
pub use urls::{build_page_url, build_structured_url};

/// Default registry API base.
pub const DEFAULT_API_BASE: &str = "https://www.federalregister.gov/api/v1";

/// Default public site base.
pub const DEFAULT_SITE_BASE: &str = "https://www.federalregister.gov";

/// Path under the site base holding structured full text.
const STRUCTURED_PATH: &str = "documents/full_text/xml";

/// Base URLs for the registry API, public site and structured full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEndpoints {
    /// JSON listing API, e.g. `https://www.federalregister.gov/api/v1`.
    pub api_base: String,
    /// Public website root.
    pub site_base: String,
    /// Root of the structured (XML) full-text tree.
    pub structured_base: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_SITE_BASE)
    }
}

impl RegistryEndpoints {
    /// Creates endpoints from an API base and a site base; the structured base
    /// is derived from the site base.
    #[must_use]
    pub fn new(api_base: &str, site_base: &str) -> Self {
        let site_base = trim_base(site_base);
        Self {
            api_base: trim_base(api_base),
            structured_base: format!("{site_base}/{STRUCTURED_PATH}"),
            site_base,
        }
    }

    /// Points every endpoint at one host, with the API under `/api/v1`.
    ///
    /// Used to aim the whole pipeline at a mirror or a mock server.
    #[must_use]
    pub fn with_site_base(site_base: &str) -> Self {
        let site_base = trim_base(site_base);
        Self::new(&format!("{site_base}/api/v1"), &site_base)
    }

    /// Base for page views: `{site_base}/documents`.
    #[must_use]
    pub fn page_base(&self) -> String {
        format!("{}/documents", self.site_base)
    }

    /// Listing endpoint: `{api_base}/documents.json`.
    #[must_use]
    pub fn listing_url(&self) -> String {
        format!("{}/documents.json", self.api_base)
    }

    /// Search page used by the page-scrape fallback.
    #[must_use]
    pub fn search_url(&self) -> String {
        format!("{}/documents/search", self.site_base)
    }
}

fn trim_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// A citation attached to a document (e.g. `40 CFR 63`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationReference {
    /// CFR title number.
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    /// CFR part.
    #[serde(default, deserialize_with = "loose_string")]
    pub part: Option<String>,
    /// Full citation text.
    #[serde(default, deserialize_with = "loose_string")]
    pub citation: Option<String>,
}

/// Accepts a string or a number; the listing API uses both for CFR fields.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Metadata for one registry document, before its text is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    /// Document identifier (document number or date path).
    pub identifier: String,
    /// Document title.
    pub title: String,
    /// Publication date, `YYYY-MM-DD`.
    pub publication_date: Option<String>,
    /// Structured (XML) full-text URL reported by the registry.
    pub structured_url: Option<String>,
    /// Page view URL reported by the registry.
    pub page_url: Option<String>,
    /// CFR citations.
    pub citations: Vec<CitationReference>,
}

impl DocumentMetadata {
    /// Creates metadata with only an identifier and title.
    #[must_use]
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// The first citation string, if any.
    #[must_use]
    pub fn primary_citation(&self) -> Option<&str> {
        self.citations
            .iter()
            .find_map(|citation| citation.citation.as_deref())
    }
}

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// Structured (XML) full text.
    Structured,
    /// Scraped from the HTML page view.
    PageScrape,
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::PageScrape => write!(f, "page_scrape"),
        }
    }
}

/// A retrieved document: metadata plus its extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Document identifier.
    pub identifier: String,
    /// Document title.
    pub title: String,
    /// Agency slug the document was listed under.
    pub agency: String,
    /// Publication date, `YYYY-MM-DD`.
    pub publication_date: Option<String>,
    /// Structured full-text URL, when known.
    pub structured_url: Option<String>,
    /// Page view URL, when known.
    pub page_url: Option<String>,
    /// First CFR citation, if any.
    pub citation: Option<String>,
    /// Normalized document text.
    pub content: String,
    /// Which format produced `content`.
    pub content_source: ContentSource,
    /// Character count of `content`.
    pub content_length: usize,
}

impl Document {
    /// Combines listing metadata with extracted text.
    #[must_use]
    pub fn new(
        metadata: DocumentMetadata,
        agency: &str,
        content: String,
        content_source: ContentSource,
    ) -> Self {
        let citation = metadata.primary_citation().map(str::to_string);
        let content_length = content.chars().count();
        Self {
            identifier: metadata.identifier,
            title: metadata.title,
            agency: agency.to_string(),
            publication_date: metadata.publication_date,
            structured_url: metadata.structured_url,
            page_url: metadata.page_url,
            citation,
            content,
            content_source,
            content_length,
        }
    }
}
