//! Paged execution of a compiled query.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::PagingConfig;
use crate::core::QueryDriver;
use crate::error::StorageResult;
use crate::query::CompiledQuery;
use crate::types::{Page, PageInfo, PageRequest};

use super::logger::{QueryExecutionResult, QueryLogger};
use super::processor::{ResponseMetadata, ResponseProcessor};

/// One paging session over a compiled query.
///
/// The session owns its continuation token: each successful
/// [`execute_next`](Self::execute_next) replaces it with the token of the
/// response. Failures leave it untouched, so the same page can be asked
/// for again. The executor itself never retries; wrap calls in
/// [`retry_transient`](super::retry_transient) for that.
pub struct DocumentQuery<D: QueryDriver> {
    driver: Arc<D>,
    processor: Arc<dyn ResponseProcessor<D::Error>>,
    logger: Arc<dyn QueryLogger>,
    query: CompiledQuery,
    paging: PagingConfig,
    max_item_count: usize,
    continuation: Option<String>,
    has_more_results: bool,
}

impl<D: QueryDriver> std::fmt::Debug for DocumentQuery<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentQuery")
            .field("query_hash", &self.query.query_hash)
            .field("max_item_count", &self.max_item_count)
            .field("continuation", &self.continuation)
            .field("has_more_results", &self.has_more_results)
            .finish_non_exhaustive()
    }
}

impl<D: QueryDriver> DocumentQuery<D> {
    /// Creates a session positioned at the page described by `request`.
    pub fn new(
        driver: Arc<D>,
        processor: Arc<dyn ResponseProcessor<D::Error>>,
        logger: Arc<dyn QueryLogger>,
        query: CompiledQuery,
        request: PageRequest,
    ) -> Self {
        Self {
            driver,
            processor,
            logger,
            query,
            paging: PagingConfig::default(),
            max_item_count: request.max_item_count,
            continuation: request.continuation,
            has_more_results: true,
        }
    }

    /// Sets the page size limits checked before each call.
    pub fn with_paging(mut self, paging: PagingConfig) -> Self {
        self.paging = paging;
        self
    }

    /// Returns true until a response arrives without a continuation token.
    pub fn has_more_results(&self) -> bool {
        self.has_more_results
    }

    /// Returns the token of the next page.
    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    /// The compiled query being paged.
    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    /// Fetches the next page.
    ///
    /// Dropping the returned future cancels the backend call when the
    /// driver supports it.
    /// A page size of zero or above the configured maximum is rejected with
    /// [`SearchError::InvalidPageSize`](crate::error::SearchError::InvalidPageSize)
    /// before the driver is called.
    pub async fn execute_next(&mut self) -> StorageResult<Page<D::Item>> {
        self.paging.page_size(Some(self.max_item_count))?;
        let query_id = Uuid::new_v4();

        self.logger.log_query_execution(
            query_id,
            &self.query.sql,
            self.continuation.as_deref(),
            self.max_item_count,
        );

        let request = PageRequest::first(self.max_item_count)
            .with_continuation(self.continuation.clone());

        match self.driver.execute(&self.query, &request).await {
            Ok(response) => {
                let count = response.count();
                self.processor.process_response(&ResponseMetadata {
                    activity_id: &response.activity_id,
                    request_charge: response.request_charge,
                    count,
                });

                self.continuation = response.continuation;
                self.has_more_results = self.continuation.is_some();

                self.logger.log_query_execution_result(
                    query_id,
                    QueryExecutionResult {
                        activity_id: Some(&response.activity_id),
                        request_charge: response.request_charge,
                        continuation: self.continuation.as_deref(),
                        count,
                        error: None,
                    },
                );

                Ok(Page::new(
                    response.items,
                    PageInfo {
                        continuation: self.continuation.clone(),
                        activity_id: Some(response.activity_id),
                        request_charge: response.request_charge,
                    },
                ))
            }
            Err(e) => {
                self.logger.log_query_execution_result(
                    query_id,
                    QueryExecutionResult {
                        activity_id: None,
                        request_charge: 0.0,
                        continuation: None,
                        count: 0,
                        error: Some(&e),
                    },
                );

                Err(self.processor.process_error(e))
            }
        }
    }
}
