//! Paginated query execution.
//!
//! [`DocumentQuery`] pages through a [`CompiledQuery`](crate::query::CompiledQuery)
//! using a [`QueryDriver`](crate::core::QueryDriver). Each page request is
//! logged through a [`QueryLogger`] and every response or failure passes
//! through a [`ResponseProcessor`].

mod document_query;
mod logger;
mod processor;
mod retry;

pub use document_query::DocumentQuery;
pub use logger::{QueryExecutionResult, QueryLogger, TracingQueryLogger};
pub use processor::{RequestMetrics, RequestMetricsRecorder, ResponseMetadata, ResponseProcessor};
pub use retry::retry_transient;
