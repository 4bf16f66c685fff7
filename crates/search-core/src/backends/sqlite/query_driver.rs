//! Runs compiled queries against SQLite, one page at a time.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::InterruptHandle;
use thiserror::Error;

use crate::config::PagingConfig;
use crate::core::{FeedResponse, QueryDriver};
use crate::query::CompiledQuery;
use crate::types::{ContinuationToken, PageRequest, ResourceRecord};

use super::SqliteBackend;

/// Native errors of [`SqliteQueryDriver`].
#[derive(Debug, Error)]
pub enum SqliteQueryError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),

    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("page size {requested} is outside 1..={max}")]
    InvalidPageSize { requested: usize, max: usize },

    #[error("stored resource is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("resource row {surrogate_id} has an invalid last_updated value {value}")]
    InvalidTimestamp { surrogate_id: i64, value: i64 },

    #[error("query task failed: {message}")]
    Task { message: String, cancelled: bool },
}

/// Query driver producing [`ResourceRecord`]s.
///
/// Each page runs on a blocking thread. If the awaiting future is dropped
/// the statement is interrupted, so abandoned requests stop consuming the
/// database.
#[derive(Debug, Clone)]
pub struct SqliteQueryDriver {
    pool: Pool<SqliteConnectionManager>,
    max_page_size: usize,
}

impl SqliteQueryDriver {
    /// Creates a driver sharing the backend's pool.
    pub fn new(backend: &SqliteBackend) -> Self {
        Self {
            pool: backend.pool().clone(),
            max_page_size: PagingConfig::default().max_page_size,
        }
    }

    /// Sets the largest page size the driver accepts.
    pub fn with_paging(mut self, paging: &PagingConfig) -> Self {
        self.max_page_size = paging.max_page_size;
        self
    }
}

/// Interrupts the connection when dropped, unless disarmed.
struct InterruptOnDrop(Option<InterruptHandle>);

impl InterruptOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            tracing::debug!("Query abandoned, interrupting SQLite statement");
            handle.interrupt();
        }
    }
}

#[async_trait]
impl QueryDriver for SqliteQueryDriver {
    type Item = ResourceRecord;
    type Error = SqliteQueryError;

    async fn execute(
        &self,
        query: &CompiledQuery,
        request: &PageRequest,
    ) -> Result<FeedResponse<ResourceRecord>, SqliteQueryError> {
        let after = match request.continuation.as_deref() {
            Some(token) => Some(
                ContinuationToken::decode_for(token, &query.query_hash)
                    .map_err(|_| SqliteQueryError::InvalidToken(token.to_string()))?
                    .last_surrogate_id(),
            ),
            None => None,
        };

        let page_size = request.max_item_count;
        if page_size == 0 || page_size > self.max_page_size {
            return Err(SqliteQueryError::InvalidPageSize {
                requested: page_size,
                max: self.max_page_size,
            });
        }
        let fragment = query.paged(after, page_size);
        let query_hash = query.query_hash.clone();

        let conn = self.pool.get()?;
        let mut guard = InterruptOnDrop(Some(conn.get_interrupt_handle()));

        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || run_page(conn, &fragment.sql, &fragment.params));
        let joined = task.await;
        guard.disarm();

        let mut items = joined.map_err(|e| SqliteQueryError::Task {
            message: e.to_string(),
            cancelled: e.is_cancelled(),
        })??;

        let continuation = if items.len() > page_size {
            items.truncate(page_size);
            items
                .last()
                .map(|last| ContinuationToken::new(last.surrogate_id, query_hash).encode())
        } else {
            None
        };

        Ok(FeedResponse {
            items,
            continuation,
            activity_id: uuid::Uuid::new_v4().to_string(),
            request_charge: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

fn run_page(
    conn: PooledConnection<SqliteConnectionManager>,
    sql: &str,
    params: &[crate::query::SqlParam],
) -> Result<Vec<ResourceRecord>, SqliteQueryError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let surrogate_id: i64 = row.get(0)?;
        let raw: String = row.get(5)?;
        let millis: i64 = row.get(4)?;
        let last_updated = Utc.timestamp_millis_opt(millis).single().ok_or(
            SqliteQueryError::InvalidTimestamp {
                surrogate_id,
                value: millis,
            },
        )?;
        items.push(ResourceRecord {
            surrogate_id,
            resource_type: row.get(1)?,
            resource_id: row.get(2)?,
            version: row.get(3)?,
            last_updated,
            content: serde_json::from_str(&raw)?,
        });
    }
    Ok(items)
}
