//! Execution of one page of a compiled query.

use async_trait::async_trait;

use crate::query::CompiledQuery;
use crate::types::PageRequest;

/// One page returned by a [`QueryDriver`], with backend metadata.
#[derive(Debug, Clone)]
pub struct FeedResponse<T> {
    /// Rows in this page.
    pub items: Vec<T>,

    /// Token for the next page; `None` when the result set is exhausted.
    pub continuation: Option<String>,

    /// Backend identifier of the request.
    pub activity_id: String,

    /// Backend cost of the request, in backend-specific units.
    pub request_charge: f64,
}

impl<T> FeedResponse<T> {
    /// Number of rows in the page.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Runs compiled queries against a backend, one page per call.
///
/// Drivers return their native error type; the executor hands failures to
/// a [`ResponseProcessor`](crate::execution::ResponseProcessor) for
/// classification.
#[async_trait]
pub trait QueryDriver: Send + Sync {
    /// Row type produced by this driver.
    type Item: Send;

    /// Native error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes one page of `query`.
    async fn execute(
        &self,
        query: &CompiledQuery,
        request: &PageRequest,
    ) -> Result<FeedResponse<Self::Item>, Self::Error>;
}
