//! Structured-text and page URL composition.
//!
//! Pure string composition: the same metadata and endpoints always produce
//! the same URL, and nothing here touches the network.

use tracing::{debug, warn};
use url::Url;

use super::identifier::classify_identifier;
use super::{DocumentMetadata, RegistryEndpoints};

/// Builds the structured (XML) full-text URL for a document.
///
/// A usable absolute URL already present on the metadata wins. Otherwise the
/// identifier must validate; date-path identifiers are used verbatim, other
/// shapes are placed under the publication date when one is known.
///
/// # Examples
///
/// ```
/// use regfetch_core::registry::{DocumentMetadata, RegistryEndpoints, build_structured_url};
///
/// let mut metadata = DocumentMetadata::new("2021-08964", "Clean Air Act Revisions");
/// metadata.publication_date = Some("2021-04-29".to_string());
/// let url = build_structured_url(&metadata, &RegistryEndpoints::default());
/// assert_eq!(
///     url.as_deref(),
///     Some("https://www.federalregister.gov/documents/full_text/xml/2021/04/29/2021-08964.xml")
/// );
/// ```
#[must_use]
pub fn build_structured_url(
    metadata: &DocumentMetadata,
    endpoints: &RegistryEndpoints,
) -> Option<String> {
    if let Some(url) = usable_absolute_url(metadata.structured_url.as_deref()) {
        return Some(url.to_string());
    }
    let url = compose(
        &metadata.identifier,
        metadata.publication_date.as_deref(),
        &endpoints.structured_base,
        ".xml",
    )?;
    debug!(identifier = %metadata.identifier, url = %url, "built structured URL");
    Some(url)
}

/// Builds the human-readable page URL for a document.
///
/// Same precedence as [`build_structured_url`], against the page base and
/// without a file extension.
#[must_use]
pub fn build_page_url(metadata: &DocumentMetadata, endpoints: &RegistryEndpoints) -> Option<String> {
    if let Some(url) = usable_absolute_url(metadata.page_url.as_deref()) {
        return Some(url.to_string());
    }
    let url = compose(
        &metadata.identifier,
        metadata.publication_date.as_deref(),
        &endpoints.page_base(),
        "",
    )?;
    debug!(identifier = %metadata.identifier, url = %url, "built page URL");
    Some(url)
}

fn compose(identifier: &str, publication_date: Option<&str>, base: &str, ext: &str) -> Option<String> {
    let Some(shape) = classify_identifier(identifier) else {
        warn!(identifier, "refusing to build URL for invalid identifier");
        return None;
    };

    if shape.embeds_date() {
        return Some(format!("{base}/{identifier}{ext}"));
    }

    match publication_date.and_then(split_date) {
        Some((year, month, day)) => Some(format!("{base}/{year}/{month}/{day}/{identifier}{ext}")),
        None => Some(format!("{base}/{identifier}{ext}")),
    }
}

/// Splits `YYYY-MM-DD` into its three parts; anything else is ignored.
fn split_date(date: &str) -> Option<(&str, &str, &str)> {
    let mut parts = date.trim().split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || year.is_empty() || month.is_empty() || day.is_empty() {
        return None;
    }
    Some((year, month, day))
}

/// Returns `value` when it parses as an absolute `http`/`https` URL.
fn usable_absolute_url(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    let parsed = Url::parse(value).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(identifier: &str, date: Option<&str>) -> DocumentMetadata {
        let mut metadata = DocumentMetadata::new(identifier, "Test Document");
        metadata.publication_date = date.map(str::to_string);
        metadata
    }

    // ==================== Structured URL Tests ====================

    #[test]
    fn test_structured_url_with_publication_date() {
        let url = build_structured_url(
            &metadata("2021-08964", Some("2021-04-29")),
            &RegistryEndpoints::default(),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/full_text/xml/2021/04/29/2021-08964.xml")
        );
    }

    #[test]
    fn test_structured_url_without_publication_date() {
        let url = build_structured_url(&metadata("2021-08964", None), &RegistryEndpoints::default());
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/full_text/xml/2021-08964.xml")
        );
    }

    #[test]
    fn test_structured_url_malformed_date_ignored() {
        let url = build_structured_url(
            &metadata("2021-08964", Some("April 2021")),
            &RegistryEndpoints::default(),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/full_text/xml/2021-08964.xml")
        );
    }

    #[test]
    fn test_date_path_identifier_never_recombined() {
        let url = build_structured_url(
            &metadata("2021/04/29/clean-air", Some("2022-01-01")),
            &RegistryEndpoints::default(),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/full_text/xml/2021/04/29/clean-air.xml")
        );
    }

    #[test]
    fn test_existing_structured_url_returned_unchanged() {
        let mut meta = metadata("2021-08964", Some("2021-04-29"));
        meta.structured_url = Some("https://cdn.example.gov/xml/2021-08964.xml".to_string());
        let url = build_structured_url(&meta, &RegistryEndpoints::default());
        assert_eq!(url.as_deref(), Some("https://cdn.example.gov/xml/2021-08964.xml"));
    }

    #[test]
    fn test_relative_structured_url_is_not_usable() {
        let mut meta = metadata("2021-08964", None);
        meta.structured_url = Some("/xml/2021-08964.xml".to_string());
        let url = build_structured_url(&meta, &RegistryEndpoints::default());
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/full_text/xml/2021-08964.xml")
        );
    }

    #[test]
    fn test_invalid_identifier_yields_none() {
        let endpoints = RegistryEndpoints::default();
        assert_eq!(build_structured_url(&metadata("invalid", None), &endpoints), None);
        assert_eq!(build_page_url(&metadata("", Some("2021-04-29")), &endpoints), None);
    }

    #[test]
    fn test_builders_are_pure() {
        let meta = metadata("E9-30894", Some("2009-12-30"));
        let endpoints = RegistryEndpoints::default();
        assert_eq!(
            build_structured_url(&meta, &endpoints),
            build_structured_url(&meta, &endpoints)
        );
        assert_eq!(build_page_url(&meta, &endpoints), build_page_url(&meta, &endpoints));
    }

    // ==================== Page URL Tests ====================

    #[test]
    fn test_page_url_with_publication_date() {
        let url = build_page_url(
            &metadata("2021-08964", Some("2021-04-29")),
            &RegistryEndpoints::default(),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/2021/04/29/2021-08964")
        );
    }

    #[test]
    fn test_page_url_date_path_identifier() {
        let url = build_page_url(
            &metadata("2021/04/29/clean-air", None),
            &RegistryEndpoints::default(),
        );
        assert_eq!(
            url.as_deref(),
            Some("https://www.federalregister.gov/documents/2021/04/29/clean-air")
        );
    }

    #[test]
    fn test_page_url_against_custom_site_base() {
        let endpoints = RegistryEndpoints::with_site_base("http://127.0.0.1:9000/");
        let url = build_page_url(&metadata("2021-ABC-123", None), &endpoints);
        assert_eq!(url.as_deref(), Some("http://127.0.0.1:9000/documents/2021-ABC-123"));
    }
}
