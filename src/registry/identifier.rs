//! Document identifier shapes accepted by the registry.
//!
//! Every URL the crate builds starts from an identifier that passed
//! [`validate_identifier`]. Anything else is rejected before composition.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// `2021-08964`
static STANDARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\d{4}-\d{5}$"));

/// `2021-ABC-123`
static ALPHANUMERIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\d{4}-\w+-\d+$"));

/// `E9-30894`
static EXECUTIVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^E\d-\d{5}$"));

/// `2021/04/29/document-slug`
static DATE_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\d{4}/\d{2}/\d{2}/[\w-]+$"));

/// Document URL with a date path: `/documents/2021/04/29/2021-08964/slug`.
static DATED_DOCUMENT_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"/documents/(\d{4})/(\d{2})/(\d{2})/([^/?#]+)")
});

/// Document URL addressed directly by identifier: `/documents/2021-08964`.
static DIRECT_DOCUMENT_URL: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"/documents/(\d{4}-\d{5}|\d{4}-\w+-\d+|E\d-\d{5})(?:[/?#.]|$)")
});

/// The recognized identifier shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierShape {
    /// Year plus five digits, e.g. `2021-08964`.
    Standard,
    /// Year, alphanumeric segment, number, e.g. `2021-ABC-123`.
    Alphanumeric,
    /// Executive document number, e.g. `E9-30894`.
    Executive,
    /// Identifier carrying its own publication date path.
    DatePath,
}

impl IdentifierShape {
    /// True when the identifier already encodes `YYYY/MM/DD/`.
    #[must_use]
    pub fn embeds_date(self) -> bool {
        matches!(self, Self::DatePath)
    }
}

/// Returns the shape `id` matches, or `None` for anything unrecognized.
#[must_use]
pub fn classify_identifier(id: &str) -> Option<IdentifierShape> {
    if id.is_empty() {
        return None;
    }
    let shape = if STANDARD_PATTERN.is_match(id) {
        IdentifierShape::Standard
    } else if ALPHANUMERIC_PATTERN.is_match(id) {
        IdentifierShape::Alphanumeric
    } else if EXECUTIVE_PATTERN.is_match(id) {
        IdentifierShape::Executive
    } else if DATE_PATH_PATTERN.is_match(id) {
        IdentifierShape::DatePath
    } else {
        trace!(id, "identifier matches no known shape");
        return None;
    };
    Some(shape)
}

/// True iff `id` matches one of the accepted identifier shapes.
#[must_use]
pub fn validate_identifier(id: &str) -> bool {
    classify_identifier(id).is_some()
}

/// Recovers a document identifier from a registry document URL.
///
/// Date-path URLs yield the segment directly after the date, which on the
/// public site is the document number.
#[must_use]
pub fn identifier_from_url(url: &str) -> Option<String> {
    if let Some(caps) = DATED_DOCUMENT_URL.captures(url) {
        return Some(caps[4].to_string());
    }
    DIRECT_DOCUMENT_URL
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Publication date (`YYYY-MM-DD`) encoded in a date-path document URL.
#[must_use]
pub fn publication_date_from_url(url: &str) -> Option<String> {
    DATED_DOCUMENT_URL
        .captures(url)
        .map(|caps| format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Shape Tests ====================

    #[test]
    fn test_standard_identifier_accepted() {
        assert_eq!(
            classify_identifier("2021-08964"),
            Some(IdentifierShape::Standard)
        );
    }

    #[test]
    fn test_alphanumeric_identifier_accepted() {
        assert_eq!(
            classify_identifier("2021-ABC-123"),
            Some(IdentifierShape::Alphanumeric)
        );
    }

    #[test]
    fn test_executive_identifier_accepted() {
        assert_eq!(
            classify_identifier("E9-30894"),
            Some(IdentifierShape::Executive)
        );
    }

    #[test]
    fn test_date_path_identifier_accepted() {
        let shape = classify_identifier("2021/04/29/document-slug");
        assert_eq!(shape, Some(IdentifierShape::DatePath));
        assert!(shape.is_some_and(IdentifierShape::embeds_date));
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        for id in [
            "",
            "invalid",
            "21-08964",
            "2021-0896",
            "2021-089644",
            "E10-30894",
            "2021/4/29/slug",
            "2021/04/29/",
            " 2021-08964",
            "2021-08964/extra",
        ] {
            assert!(!validate_identifier(id), "{id:?} should be rejected");
        }
    }

    // ==================== URL Recovery Tests ====================

    #[test]
    fn test_identifier_from_dated_url() {
        let url = "https://www.federalregister.gov/documents/2021/04/29/2021-08964/some-title";
        assert_eq!(identifier_from_url(url).as_deref(), Some("2021-08964"));
    }

    #[test]
    fn test_identifier_from_direct_url() {
        assert_eq!(
            identifier_from_url("https://www.federalregister.gov/documents/E9-30894").as_deref(),
            Some("E9-30894")
        );
        assert_eq!(
            identifier_from_url("/documents/2021-08964?utm=x").as_deref(),
            Some("2021-08964")
        );
    }

    #[test]
    fn test_publication_date_from_dated_url() {
        assert_eq!(
            publication_date_from_url("/documents/2021/04/29/2021-08964/slug").as_deref(),
            Some("2021-04-29")
        );
        assert_eq!(publication_date_from_url("/documents/2021-08964"), None);
    }

    #[test]
    fn test_identifier_from_unrelated_url() {
        assert_eq!(identifier_from_url("https://example.com/about"), None);
        assert_eq!(
            identifier_from_url("https://www.federalregister.gov/documents/search"),
            None
        );
    }
}
