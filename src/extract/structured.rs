//! Structured (XML) full-text parsing.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::normalize::normalize_whitespace;

/// Collects every text and CDATA node of `xml` in document order.
///
/// Element text and trailing text are treated alike; the pieces are joined
/// with single spaces and whitespace is collapsed.
///
/// # Errors
///
/// Returns the reader error when the document is not well-formed.
pub fn parse_structured_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pieces: Vec<String> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map(std::borrow::Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                if !text.trim().is_empty() {
                    pieces.push(text);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                if !text.trim().is_empty() {
                    pieces.push(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(normalize_whitespace(&pieces.join(" ")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_text_and_tails() {
        let xml = r"<RULE><PREAMB><AGENCY>EPA</AGENCY> Final rule.</PREAMB><SUPLINF><P>Section  one</P><P>Section two</P></SUPLINF></RULE>";
        assert_eq!(
            parse_structured_text(xml).unwrap(),
            "EPA Final rule. Section one Section two"
        );
    }

    #[test]
    fn test_unescapes_entities() {
        let xml = "<P>Air &amp; Water &lt;standards&gt;</P>";
        assert_eq!(parse_structured_text(xml).unwrap(), "Air & Water <standards>");
    }

    #[test]
    fn test_includes_cdata() {
        let xml = "<DOC><![CDATA[raw <text>]]><P>after</P></DOC>";
        assert_eq!(parse_structured_text(xml).unwrap(), "raw <text> after");
    }

    #[test]
    fn test_skips_declaration_and_comments() {
        let xml = "<?xml version=\"1.0\"?><!-- note --><DOC>\n  <P>body</P>\n</DOC>";
        assert_eq!(parse_structured_text(xml).unwrap(), "body");
    }

    #[test]
    fn test_mismatched_tags_error() {
        assert!(parse_structured_text("<DOC><P>text</DOC>").is_err());
    }
}
