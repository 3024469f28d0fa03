//! Page-view (HTML) scraping.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::normalize::normalize_whitespace;

/// Content regions, most specific first.
const CONTENT_SELECTORS: [&str; 6] = [
    ".full-text",
    ".document-content",
    ".body-column",
    ".document-body",
    "article",
    ".content",
];

/// Subtrees that never carry document text.
const STRIPPED_TAGS: [&str; 6] = ["nav", "header", "footer", "aside", "script", "style"];

static CONTENT_REGIONS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|selector| Selector::parse(selector).ok())
        .collect()
});

static BODY: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("body").ok());

/// Extracts the document text from a page view.
///
/// The first region matching the content selectors wins, else `<body>`.
/// Navigation, header, footer, aside, script and style subtrees are skipped.
/// Returns `None` when no text remains.
#[must_use]
pub fn parse_page_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let region = CONTENT_REGIONS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| {
            BODY.as_ref()
                .and_then(|selector| document.select(selector).next())
        })?;

    let mut pieces = Vec::new();
    collect_text(region, &mut pieces);
    let text = normalize_whitespace(&pieces.join(" "));
    (!text.is_empty()).then_some(text)
}

fn collect_text<'a>(element: ElementRef<'a>, pieces: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let text: &str = text;
            if !text.trim().is_empty() {
                pieces.push(text);
            }
        } else if let Some(child) = ElementRef::wrap(child) {
            if !STRIPPED_TAGS.contains(&child.value().name()) {
                collect_text(child, pieces);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_full_text_region() {
        let html = r#"<html><body>
            <div class="content">generic wrapper</div>
            <div class="full-text"><p>Rule text here.</p><p>More rule text.</p></div>
        </body></html>"#;
        assert_eq!(
            parse_page_text(html).unwrap(),
            "Rule text here. More rule text."
        );
    }

    #[test]
    fn test_selector_priority_order() {
        let html = r#"<html><body>
            <article>article text</article>
            <div class="body-column">column text</div>
        </body></html>"#;
        assert_eq!(parse_page_text(html).unwrap(), "column text");
    }

    #[test]
    fn test_body_fallback_strips_chrome() {
        let html = r"<html><head><style>p { color: red }</style></head><body>
            <header>Site header</header>
            <nav>Menu</nav>
            <main><p>Body paragraph.</p><script>var x = 1;</script></main>
            <aside>Related</aside>
            <footer>Footer</footer>
        </body></html>";
        assert_eq!(parse_page_text(html).unwrap(), "Body paragraph.");
    }

    #[test]
    fn test_strips_chrome_inside_region() {
        let html = r#"<html><body><div class="document-content">
            <nav>Table of contents</nav><p>Actual  text</p>
        </div></body></html>"#;
        assert_eq!(parse_page_text(html).unwrap(), "Actual text");
    }

    #[test]
    fn test_empty_page_yields_none() {
        assert!(parse_page_text("<html><body><nav>only nav</nav></body></html>").is_none());
    }
}
