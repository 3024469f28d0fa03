//! The per-document operation seam.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;

use crate::registry::Document;

/// Work applied to each document by the processor.
///
/// Implementations are invoked concurrently from several tasks and may be
/// re-invoked for the same document during retry passes.
#[async_trait]
pub trait DocumentOperation: Send + Sync {
    /// Value produced for a document.
    type Output: Send + 'static;
    /// Failure reported for a document.
    type Error: Display + Send + 'static;

    /// Processes one document.
    async fn process(&self, document: &Document) -> Result<Self::Output, Self::Error>;
}

/// [`DocumentOperation`] built from a closure; see [`operation_fn`].
#[derive(Debug, Clone)]
pub struct FnOperation<F> {
    f: F,
}

/// Wraps an async closure taking an owned [`Document`] as an operation.
///
/// # Example
///
/// ```
/// use regfetch_core::processor::operation_fn;
/// use regfetch_core::registry::Document;
///
/// let word_count = operation_fn(|document: Document| async move {
///     Ok::<_, std::convert::Infallible>(document.content.split_whitespace().count())
/// });
/// # let _ = word_count;
/// ```
pub fn operation_fn<F, Fut, T, E>(f: F) -> FnOperation<F>
where
    F: Fn(Document) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    FnOperation { f }
}

#[async_trait]
impl<F, Fut, T, E> DocumentOperation for FnOperation<F>
where
    F: Fn(Document) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    type Output = T;
    type Error = E;

    async fn process(&self, document: &Document) -> Result<T, E> {
        (self.f)(document.clone()).await
    }
}
