//! Search parameter status persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

use crate::core::SearchParameterStatusDataStore;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::search::{RegistryError, ResourceSearchParameterStatus, SearchParameterStatus};

use super::SqliteBackend;

#[async_trait]
impl SearchParameterStatusDataStore for SqliteBackend {
    async fn get_search_parameter_statuses(
        &self,
    ) -> StorageResult<Vec<ResourceSearchParameterStatus>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT uri, status, is_partially_supported, last_updated
             FROM search_parameter_status",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut statuses = Vec::new();
        for row in rows {
            let (uri, status, is_partially_supported, last_updated) = row?;
            let status = status.parse::<SearchParameterStatus>().map_err(|_| {
                StorageError::Registry(RegistryError::InvalidStatus {
                    url: uri.clone(),
                    value: status.clone(),
                })
            })?;
            let last_updated = DateTime::parse_from_rfc3339(&last_updated)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| BackendError::SerializationError {
                    message: format!(
                        "invalid last_updated '{}' for search parameter {}: {}",
                        last_updated, uri, e
                    ),
                })?;

            statuses.push(ResourceSearchParameterStatus {
                uri,
                status,
                is_partially_supported,
                last_updated,
            });
        }

        Ok(statuses)
    }

    async fn insert_new_statuses(
        &self,
        statuses: &[ResourceSearchParameterStatus],
    ) -> StorageResult<usize> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO search_parameter_status
                 (uri, status, is_partially_supported, last_updated)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for status in statuses {
                inserted += stmt.execute(params![
                    status.uri,
                    status.status.as_str(),
                    status.is_partially_supported,
                    status.last_updated.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            requested = statuses.len(),
            inserted, "Inserted search parameter statuses"
        );
        Ok(inserted)
    }

    async fn upsert_statuses(
        &self,
        statuses: &[ResourceSearchParameterStatus],
    ) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO search_parameter_status
                 (uri, status, is_partially_supported, last_updated)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(uri) DO UPDATE SET
                    status = excluded.status,
                    is_partially_supported = excluded.is_partially_supported,
                    last_updated = excluded.last_updated",
            )?;
            for status in statuses {
                stmt.execute(params![
                    status.uri,
                    status.status.as_str(),
                    status.is_partially_supported,
                    status.last_updated.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend
    }

    #[tokio::test]
    async fn test_insert_is_insert_if_absent() {
        let backend = backend();
        let first = ResourceSearchParameterStatus::new(
            "http://example.org/sp",
            SearchParameterStatus::Supported,
        );
        assert_eq!(backend.insert_new_statuses(&[first.clone()]).await.unwrap(), 1);

        let again = ResourceSearchParameterStatus::new(
            "http://example.org/sp",
            SearchParameterStatus::Enabled,
        );
        assert_eq!(backend.insert_new_statuses(&[again]).await.unwrap(), 0);

        let stored = backend.get_search_parameter_statuses().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, SearchParameterStatus::Supported);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let backend = backend();
        let status = ResourceSearchParameterStatus::new(
            "http://example.org/sp",
            SearchParameterStatus::Supported,
        );
        backend.upsert_statuses(&[status]).await.unwrap();

        let status = ResourceSearchParameterStatus::new(
            "http://example.org/sp",
            SearchParameterStatus::Disabled,
        )
        .with_partially_supported(true);
        backend.upsert_statuses(&[status]).await.unwrap();

        let stored = backend.get_search_parameter_statuses().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, SearchParameterStatus::Disabled);
        assert!(stored[0].is_partially_supported);
    }

    #[tokio::test]
    async fn test_unknown_status_is_reported() {
        let backend = backend();
        backend
            .get_connection()
            .unwrap()
            .execute(
                "INSERT INTO search_parameter_status VALUES ('http://x', 'Pending', 0, '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(matches!(
            backend.get_search_parameter_statuses().await,
            Err(StorageError::Registry(RegistryError::InvalidStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_reported() {
        let backend = backend();
        backend
            .get_connection()
            .unwrap()
            .execute(
                "INSERT INTO search_parameter_status
                 (uri, status, is_partially_supported, last_updated)
                 VALUES ('http://example.org/sp', 'Enabled', 0, 'yesterday')",
                [],
            )
            .unwrap();

        let err = backend.get_search_parameter_statuses().await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::SerializationError { ref message })
                if message.contains("yesterday")
        ));
    }
}
