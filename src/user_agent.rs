//! User-Agent string sent with every registry request.
//!
//! The registry asks automated clients to identify themselves; one format
//! keeps listing, structured-text and page traffic consistent.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/regfetch/regfetch";

/// Default User-Agent for registry requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("regfetch/{version} (regulatory-research-tool; +{PROJECT_UA_URL})")
}
