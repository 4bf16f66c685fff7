//! Error types for the search core.
//!
//! Errors are grouped by the component that raises them. Every error can be
//! classified with [`StorageError::class`] so callers can decide whether to
//! retry, surface a client error, or treat the failure as fatal.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::search::errors::{LoaderError, RegistryError};

/// The primary error type for all search core operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Expression compilation errors
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Search request errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Parameter status registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Search parameter loading errors
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Distributed lock errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Stored procedure errors
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

/// Errors raised while compiling an expression tree into a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// The generator for this category has no translation for the node.
    #[error("{category} query generator cannot translate {node} expression on field {field}")]
    UnsupportedExpression {
        category: String,
        node: String,
        field: String,
    },

    /// A composite component index is outside the parameter's components.
    #[error("component index {index} is out of range for {category}")]
    InvalidComponentIndex { category: String, index: usize },

    /// A composite field node carries no component index.
    #[error("{category} expression requires a component index")]
    MissingComponentIndex { category: String },

    /// The value type does not fit the target column.
    #[error("value {value} is not valid for field {field}")]
    InvalidValue { field: String, value: String },

    /// A field node appeared outside of a search parameter scope.
    #[error("field expression on {field} must be nested in a search parameter")]
    MissingParameterScope { field: String },
}

/// Errors related to search requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The continuation token could not be decoded or belongs to another query.
    #[error("invalid continuation token: {token}")]
    InvalidContinuationToken { token: String },

    /// The parameter exists but is not currently searchable.
    #[error("search parameter {url} is not searchable")]
    ParameterNotSearchable { url: String },

    /// No query generator is registered for the parameter.
    #[error("no query generator for search parameter {url} of type {param_type}")]
    NoGenerator { url: String, param_type: String },

    /// The requested page size is outside the allowed range.
    #[error("page size {requested} is outside 1..={max}")]
    InvalidPageSize { requested: usize, max: usize },
}

/// Errors related to distributed coordination.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConcurrencyError {
    /// Lock acquisition timed out.
    #[error("lock timeout after {timeout_ms}ms for {lock_id}")]
    LockTimeout { lock_id: String, timeout_ms: u64 },

    /// The lease expired or was taken over before it could be renewed.
    #[error("lease on {lock_id} lost by {owner_id}")]
    LeaseLost { lock_id: String, owner_id: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The store is busy; the request can be retried.
    #[error("{backend_name} is busy: {message}")]
    Busy {
        backend_name: String,
        message: String,
    },

    /// The store throttled the request.
    #[error("{backend_name} rate limited the request, retry after {retry_after_ms}ms")]
    RateLimited {
        backend_name: String,
        retry_after_ms: u64,
    },

    /// The request did not complete in time.
    #[error("{backend_name} timed out after {timeout_ms}ms")]
    Timeout {
        backend_name: String,
        timeout_ms: u64,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The running query was interrupted by cancellation.
    #[error("query interrupted on {backend_name}")]
    Interrupted { backend_name: String },

    /// The schema is newer than this build understands.
    #[error("schema version {found} is newer than supported version {supported}")]
    SchemaMismatch { found: i32, supported: i32 },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors related to versioned stored procedures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcedureError {
    /// The logical procedure name is not a valid identifier.
    #[error("invalid procedure name '{name}'")]
    InvalidName { name: String },

    /// No procedure with the given full name is installed.
    #[error("procedure {full_name} is not installed")]
    NotInstalled { full_name: String },

    /// The procedure body failed to run.
    #[error("procedure {full_name} failed: {message}")]
    ExecutionFailed { full_name: String, message: String },
}

/// Coarse classification used by callers to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is malformed; do not retry.
    Structural,
    /// Temporary backend condition; retry with backoff.
    Transient,
    /// Permanent backend failure.
    Fatal,
    /// Another instance holds a lock; retry later.
    LockContention,
    /// Status reconciliation could not complete.
    Reconciliation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Structural => write!(f, "structural"),
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Fatal => write!(f, "fatal"),
            ErrorClass::LockContention => write!(f, "lock-contention"),
            ErrorClass::Reconciliation => write!(f, "reconciliation"),
        }
    }
}

impl StorageError {
    /// Returns the recovery class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::Expression(_) | StorageError::Search(_) => ErrorClass::Structural,
            StorageError::Registry(_) | StorageError::Loader(_) => ErrorClass::Reconciliation,
            StorageError::Concurrency(_) => ErrorClass::LockContention,
            StorageError::Procedure(_) => ErrorClass::Fatal,
            StorageError::Backend(err) => match err {
                BackendError::Busy { .. }
                | BackendError::RateLimited { .. }
                | BackendError::Timeout { .. }
                | BackendError::ConnectionFailed { .. }
                | BackendError::PoolExhausted { .. }
                | BackendError::Interrupted { .. } => ErrorClass::Transient,
                _ => ErrorClass::Fatal,
            },
        }
    }

    /// Returns true when the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transient | ErrorClass::LockContention
        )
    }

    /// Delay requested by the backend before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StorageError::Backend(BackendError::RateLimited { retry_after_ms, .. }) => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

/// Result type alias for search core operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Internal {
            backend_name: "unknown".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Backend(BackendError::Busy {
                    backend_name: "sqlite".to_string(),
                    message: err.to_string(),
                })
            }
            Some(ErrorCode::OperationInterrupted) => {
                StorageError::Backend(BackendError::Interrupted {
                    backend_name: "sqlite".to_string(),
                })
            }
            _ => StorageError::Backend(BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            }),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
