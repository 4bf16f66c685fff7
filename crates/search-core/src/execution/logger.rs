//! Query telemetry.

use tracing::{info, warn};
use uuid::Uuid;

/// Records the start and outcome of every page request.
pub trait QueryLogger: Send + Sync {
    /// Called before the backend is asked for a page.
    fn log_query_execution(
        &self,
        query_id: Uuid,
        sql: &str,
        continuation: Option<&str>,
        max_item_count: usize,
    );

    /// Called after the backend answered or failed.
    ///
    /// On failure `continuation` is `None`, `count` is 0 and `error` is set.
    fn log_query_execution_result(&self, query_id: Uuid, result: QueryExecutionResult<'_>);
}

/// Outcome of one page request.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutionResult<'a> {
    pub activity_id: Option<&'a str>,
    pub request_charge: f64,
    pub continuation: Option<&'a str>,
    pub count: usize,
    pub error: Option<&'a (dyn std::error::Error + 'static)>,
}

/// Writes query telemetry as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingQueryLogger;

impl QueryLogger for TracingQueryLogger {
    fn log_query_execution(
        &self,
        query_id: Uuid,
        sql: &str,
        continuation: Option<&str>,
        max_item_count: usize,
    ) {
        info!(
            %query_id,
            sql,
            continuation = continuation.unwrap_or(""),
            max_item_count,
            "Executing query"
        );
    }

    fn log_query_execution_result(&self, query_id: Uuid, result: QueryExecutionResult<'_>) {
        match result.error {
            None => info!(
                %query_id,
                activity_id = result.activity_id.unwrap_or(""),
                request_charge = result.request_charge,
                continuation = result.continuation.unwrap_or(""),
                count = result.count,
                "Query executed"
            ),
            Some(error) => warn!(
                %query_id,
                activity_id = result.activity_id.unwrap_or(""),
                request_charge = result.request_charge,
                count = result.count,
                error = %error,
                "Query failed"
            ),
        }
    }
}
