//! Built-in per-document operation: a compact JSON summary line.

use std::convert::Infallible;

use async_trait::async_trait;
use regfetch_core::{ContentSource, Document, DocumentOperation};
use serde::Serialize;

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DocumentSummary {
    pub(crate) identifier: String,
    pub(crate) agency: String,
    pub(crate) title: String,
    pub(crate) publication_date: Option<String>,
    pub(crate) citation: Option<String>,
    pub(crate) source: ContentSource,
    pub(crate) characters: usize,
    pub(crate) words: usize,
}

pub(crate) fn summarize(document: &Document) -> DocumentSummary {
    DocumentSummary {
        identifier: document.identifier.clone(),
        agency: document.agency.clone(),
        title: document.title.clone(),
        publication_date: document.publication_date.clone(),
        citation: document.citation.clone(),
        source: document.content_source,
        characters: document.content_length,
        words: document.content.split_whitespace().count(),
    }
}

/// Summarizes each document without further I/O.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SummarizeOperation;

#[async_trait]
impl DocumentOperation for SummarizeOperation {
    type Output = DocumentSummary;
    type Error = Infallible;

    async fn process(&self, document: &Document) -> Result<DocumentSummary, Infallible> {
        Ok(summarize(document))
    }
}
