//! Metadata recovery from the public search page.
//!
//! Used only when the listing API produced nothing. Entries are located by
//! prioritized selector patterns; the first pattern that finds anything wins.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::extract::normalize_whitespace;
use crate::fetch::{HttpClient, RetryOutcome, RetryPolicy, with_query};
use crate::registry::identifier::compile_static_regex;
use crate::registry::{
    DocumentMetadata, RegistryEndpoints, identifier_from_url, publication_date_from_url,
};

/// Largest page the search view serves.
const MAX_SEARCH_PAGE_SIZE: usize = 20;

/// Document number appearing in free text.
static TEXT_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\b(\d{4}-\d{5}|\d{4}-\w+-\d+)\b"));

static ENTRY_PATTERNS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"div[class*="document"], div[class*="result"], article[class*="document"], article[class*="result"]"#,
        r#"li[class*="document"]"#,
    ]
    .iter()
    .filter_map(|selector| Selector::parse(selector).ok())
    .collect()
});

static ANCHORS: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a[href]").ok());

static HEADINGS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, strong").ok());

static DATETIME: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("time[datetime]").ok());

static DATE_TEXT: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"time[class*="date"], span[class*="date"]"#).ok());

/// Fetches the search page for `agency` and extracts metadata from it.
#[instrument(skip(client, retry, endpoints), fields(agency = %agency))]
pub(crate) async fn fetch_search_page(
    client: &HttpClient,
    retry: &RetryPolicy,
    endpoints: &RegistryEndpoints,
    agency: &str,
    limit: Option<usize>,
) -> Vec<DocumentMetadata> {
    let per_page = limit.unwrap_or(MAX_SEARCH_PAGE_SIZE).min(MAX_SEARCH_PAGE_SIZE);
    let params = [
        ("conditions[agencies][]", agency.to_string()),
        ("order", "newest".to_string()),
        ("per_page", per_page.to_string()),
    ];
    let url = match with_query(&endpoints.search_url(), &params) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "cannot build search page URL");
            return Vec::new();
        }
    };

    let html = match retry.execute(|_| client.get_text(url.as_str())).await {
        RetryOutcome::Success { value, .. } => value,
        failed => {
            warn!(
                attempts = failed.attempts(),
                reason = failed.failure_reason().unwrap_or_default(),
                "search page fetch failed"
            );
            return Vec::new();
        }
    };

    let mut records = parse_search_results(&html, &endpoints.site_base);
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    info!(records = records.len(), "search page parsed");
    records
}

/// Extracts de-duplicated document metadata from a search results page.
#[must_use]
pub fn parse_search_results(html: &str, site_base: &str) -> Vec<DocumentMetadata> {
    let document = Html::parse_document(html);
    let base = Url::parse(&format!("{}/", site_base.trim_end_matches('/'))).ok();

    let entries = locate_entries(&document);
    debug!(entries = entries.len(), "search page entries located");

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter_map(|entry| entry_metadata(entry, base.as_ref()))
        .filter(|metadata| seen.insert(metadata.identifier.clone()))
        .collect()
}

fn locate_entries(document: &Html) -> Vec<ElementRef<'_>> {
    for pattern in ENTRY_PATTERNS.iter() {
        let found: Vec<_> = document.select(pattern).collect();
        if !found.is_empty() {
            return found;
        }
    }

    let Some(anchors) = ANCHORS.as_ref() else {
        return Vec::new();
    };
    document
        .select(anchors)
        .filter(|a| a.value().attr("href").is_some_and(is_document_link))
        .filter_map(|a| a.parent().and_then(ElementRef::wrap))
        .collect()
}

fn entry_metadata(entry: ElementRef<'_>, base: Option<&Url>) -> Option<DocumentMetadata> {
    let link = ANCHORS.as_ref().and_then(|anchors| {
        entry
            .select(anchors)
            .find(|a| a.value().attr("href").is_some_and(is_document_link))
    });
    let href = link.and_then(|a| a.value().attr("href"));

    let identifier = match href.and_then(identifier_from_url) {
        Some(identifier) => identifier,
        None => {
            let text = element_text(entry);
            TEXT_IDENTIFIER.captures(&text)?[1].to_string()
        }
    };

    let title = link
        .map(element_text)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            HEADINGS
                .as_ref()
                .and_then(|headings| entry.select(headings).next())
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_else(|| format!("Document {identifier}"));

    let publication_date =
        publication_date(entry).or_else(|| href.and_then(publication_date_from_url));

    let page_url = href.and_then(|href| match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Some(href.to_string()),
    });

    Some(DocumentMetadata {
        identifier,
        title,
        publication_date,
        structured_url: None,
        page_url,
        citations: Vec::new(),
    })
}

fn publication_date(entry: ElementRef<'_>) -> Option<String> {
    if let Some(datetime) = DATETIME
        .as_ref()
        .and_then(|selector| entry.select(selector).next())
        .and_then(|time| time.value().attr("datetime"))
    {
        let datetime = datetime.trim();
        if !datetime.is_empty() {
            return Some(datetime.get(..10).unwrap_or(datetime).to_string());
        }
    }
    DATE_TEXT
        .as_ref()
        .and_then(|selector| entry.select(selector).next())
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn is_document_link(href: &str) -> bool {
    identifier_from_url(href).is_some()
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
