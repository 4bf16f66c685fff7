//! Classification of SQLite query failures.

use std::sync::Arc;

use rusqlite::ErrorCode;
use tracing::debug;

use crate::error::{BackendError, SearchError, StorageError};
use crate::execution::{RequestMetricsRecorder, ResponseMetadata, ResponseProcessor};

use super::backend::BACKEND_NAME;
use super::query_driver::SqliteQueryError;

/// Records response metrics and maps [`SqliteQueryError`] to [`StorageError`].
#[derive(Debug, Default, Clone)]
pub struct SqliteResponseProcessor {
    metrics: Arc<RequestMetricsRecorder>,
}

impl SqliteResponseProcessor {
    /// Creates a processor recording into `metrics`.
    pub fn new(metrics: Arc<RequestMetricsRecorder>) -> Self {
        Self { metrics }
    }

    /// The metrics recorder.
    pub fn metrics(&self) -> &Arc<RequestMetricsRecorder> {
        &self.metrics
    }
}

impl ResponseProcessor<SqliteQueryError> for SqliteResponseProcessor {
    fn process_response(&self, response: &ResponseMetadata<'_>) {
        self.metrics.record(response);
        debug!(
            activity_id = response.activity_id,
            request_charge = response.request_charge,
            count = response.count,
            "Recorded query response"
        );
    }

    fn process_error(&self, error: SqliteQueryError) -> StorageError {
        match error {
            SqliteQueryError::InvalidToken(token) => {
                SearchError::InvalidContinuationToken { token }.into()
            }
            SqliteQueryError::InvalidPageSize { requested, max } => {
                SearchError::InvalidPageSize { requested, max }.into()
            }
            SqliteQueryError::Sqlite(e) => match e.sqlite_error_code() {
                Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                    BackendError::Busy {
                        backend_name: BACKEND_NAME.to_string(),
                        message: e.to_string(),
                    }
                    .into()
                }
                Some(ErrorCode::OperationInterrupted) => BackendError::Interrupted {
                    backend_name: BACKEND_NAME.to_string(),
                }
                .into(),
                _ => BackendError::QueryError {
                    message: e.to_string(),
                }
                .into(),
            },
            SqliteQueryError::Pool(_) => BackendError::PoolExhausted {
                backend_name: BACKEND_NAME.to_string(),
            }
            .into(),
            SqliteQueryError::Decode(e) => BackendError::SerializationError {
                message: e.to_string(),
            }
            .into(),
            e @ SqliteQueryError::InvalidTimestamp { .. } => BackendError::SerializationError {
                message: e.to_string(),
            }
            .into(),
            SqliteQueryError::Task {
                cancelled: true, ..
            } => BackendError::Interrupted {
                backend_name: BACKEND_NAME.to_string(),
            }
            .into(),
            SqliteQueryError::Task { message, .. } => BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message,
                source: None,
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn test_classification() {
        let processor = SqliteResponseProcessor::default();

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert_eq!(
            processor.process_error(busy.into()).class(),
            ErrorClass::Transient
        );

        let interrupted = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
            None,
        );
        assert!(matches!(
            processor.process_error(interrupted.into()),
            StorageError::Backend(BackendError::Interrupted { .. })
        ));

        let syntax = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some("near \"SELEC\": syntax error".to_string()),
        );
        assert_eq!(
            processor.process_error(syntax.into()).class(),
            ErrorClass::Fatal
        );

        let token = SqliteQueryError::InvalidToken("garbage".to_string());
        assert_eq!(processor.process_error(token).class(), ErrorClass::Structural);

        let size = SqliteQueryError::InvalidPageSize {
            requested: 0,
            max: 1000,
        };
        assert!(matches!(
            processor.process_error(size),
            StorageError::Search(SearchError::InvalidPageSize { requested: 0, max: 1000 })
        ));

        let timestamp = SqliteQueryError::InvalidTimestamp {
            surrogate_id: 7,
            value: i64::MAX,
        };
        let err = processor.process_error(timestamp);
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::SerializationError { .. })
        ));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }
}
