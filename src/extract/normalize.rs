//! Whitespace normalization and length validation shared by every format.

use serde::Serialize;
use tracing::{debug, warn};

/// Default minimum usable content length, in characters.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 50;

/// Default maximum content length, in characters.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 1_000_000;

/// Length bounds and fallback switch for extracted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentLimits {
    /// Shorter normalized text is rejected.
    pub min_length: usize,
    /// Longer normalized text is truncated to exactly this many characters.
    pub max_length: usize,
    /// Whether to scrape the page view when structured text fails.
    pub page_fallback: bool,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_CONTENT_LENGTH,
            max_length: DEFAULT_MAX_CONTENT_LENGTH,
            page_fallback: true,
        }
    }
}

/// Text that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedText {
    /// Normalized, possibly truncated text.
    pub text: String,
    /// Character count before truncation.
    pub original_length: usize,
    /// Whether truncation happened.
    pub truncated: bool,
}

/// Collapses every run of whitespace to a single space and trims the ends.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes `text` and applies the length bounds.
///
/// Returns `None` when the normalized text is shorter than `min_length`.
/// Text longer than `max_length` is cut to exactly `max_length` characters.
#[must_use]
pub fn validate_content(text: &str, limits: &ContentLimits) -> Option<ValidatedText> {
    let normalized = normalize_whitespace(text);
    let original_length = normalized.chars().count();

    if original_length < limits.min_length {
        debug!(
            length = original_length,
            min = limits.min_length,
            "content too short"
        );
        return None;
    }

    if original_length <= limits.max_length {
        return Some(ValidatedText {
            text: normalized,
            original_length,
            truncated: false,
        });
    }

    warn!(
        length = original_length,
        max = limits.max_length,
        "content exceeds maximum length, truncating"
    );
    let cut = normalized
        .char_indices()
        .nth(limits.max_length)
        .map_or(normalized.len(), |(idx, _)| idx);
    let mut text = normalized;
    text.truncate(cut);

    Some(ValidatedText {
        text,
        original_length,
        truncated: true,
    })
}
