//! Persistence of search parameter statuses.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::search::ResourceSearchParameterStatus;

/// Durable store of [`ResourceSearchParameterStatus`] records keyed by URI.
#[async_trait]
pub trait SearchParameterStatusDataStore: Send + Sync {
    /// Returns every persisted status record.
    async fn get_search_parameter_statuses(
        &self,
    ) -> StorageResult<Vec<ResourceSearchParameterStatus>>;

    /// Inserts records whose URI has no persisted record yet.
    ///
    /// Records whose URI already exists are skipped, so concurrent
    /// reconcilers inserting the same URI leave exactly one record. Returns
    /// the number of records actually inserted.
    async fn insert_new_statuses(
        &self,
        statuses: &[ResourceSearchParameterStatus],
    ) -> StorageResult<usize>;

    /// Inserts or replaces records.
    async fn upsert_statuses(&self, statuses: &[ResourceSearchParameterStatus])
    -> StorageResult<()>;
}
