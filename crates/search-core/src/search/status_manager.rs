//! Reconciles persisted parameter statuses with the in-memory catalog.
//!
//! At startup the catalog holds every known definition with default flags.
//! [`SearchParameterStatusManager::ensure_initialized`] reads the persisted
//! status of each parameter, derives the runtime flags from it, records a
//! `Supported` status for parameters seen for the first time, and announces
//! the parameters whose flags changed.
//!
//! Flag rules:
//!
//! | Persisted status | `is_searchable` | `is_supported`        |
//! |------------------|-----------------|-----------------------|
//! | Enabled          | true            | true                  |
//! | Supported        | false           | true                  |
//! | Disabled         | false           | resolver re-check     |
//! | (none)           | false           | resolver              |

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::SearchParameterStatusDataStore;
use crate::error::StorageResult;
use crate::types::SearchParameterInfo;

use super::catalog::SearchParameterCatalog;
use super::errors::RegistryError;
use super::notification::{SearchParameterChangePublisher, SearchParametersUpdated};
use super::status::{ResourceSearchParameterStatus, SearchParameterStatus};
use super::support::SearchParameterSupportResolver;

/// Keeps catalog flags in step with persisted statuses.
///
/// Reconciliation and status changes run one at a time per manager, so
/// flags derived from one store read are never applied over a later change.
pub struct SearchParameterStatusManager {
    store: Arc<dyn SearchParameterStatusDataStore>,
    catalog: Arc<SearchParameterCatalog>,
    resolver: Arc<dyn SearchParameterSupportResolver>,
    publisher: Arc<dyn SearchParameterChangePublisher>,
    update_lock: Mutex<()>,
}

impl std::fmt::Debug for SearchParameterStatusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterStatusManager")
            .field("catalog_len", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl SearchParameterStatusManager {
    /// Creates a status manager.
    pub fn new(
        store: Arc<dyn SearchParameterStatusDataStore>,
        catalog: Arc<SearchParameterCatalog>,
        resolver: Arc<dyn SearchParameterSupportResolver>,
        publisher: Arc<dyn SearchParameterChangePublisher>,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            publisher,
            update_lock: Mutex::new(()),
        }
    }

    /// Returns the catalog governed by this manager.
    pub fn catalog(&self) -> &Arc<SearchParameterCatalog> {
        &self.catalog
    }

    /// Reconciles the catalog with the persisted statuses.
    ///
    /// Safe to call repeatedly and from several instances at once: new
    /// records are inserted only if absent, and a second call over an
    /// unchanged store changes no flags. A notification is published on
    /// every successful call, even when nothing changed. Returns the
    /// parameters whose flags changed.
    pub async fn ensure_initialized(&self) -> StorageResult<Vec<Arc<SearchParameterInfo>>> {
        let _guard = self.update_lock.lock().await;
        let persisted: HashMap<String, ResourceSearchParameterStatus> = self
            .store
            .get_search_parameter_statuses()
            .await?
            .into_iter()
            .map(|s| (s.uri.clone(), s))
            .collect();

        let snapshot = self.catalog.snapshot();
        let mut updates = Vec::new();
        let mut new_statuses = Vec::new();

        for param in snapshot.all() {
            match persisted.get(&param.url) {
                Some(record) => {
                    if let Some(update) = self.reconcile(param, record)? {
                        updates.push(update);
                    }
                }
                None => {
                    let is_supported = self.resolver.is_supported(param)?;
                    new_statuses.push(ResourceSearchParameterStatus::new(
                        param.url.clone(),
                        SearchParameterStatus::Supported,
                    ));
                    updates.push((**param).clone().with_flags(
                        false,
                        is_supported,
                        param.is_partially_supported,
                    ));
                }
            }
        }

        if !new_statuses.is_empty() {
            let inserted = self.store.insert_new_statuses(&new_statuses).await?;
            debug!(
                discovered = new_statuses.len(),
                inserted, "Recorded statuses for new search parameters"
            );
        }

        let updated = self.catalog.apply(updates)?;
        info!(
            total = snapshot.len(),
            updated = updated.len(),
            "Search parameter statuses reconciled"
        );

        self.publisher
            .publish(SearchParametersUpdated::new(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Moves the given parameters to `status`.
    ///
    /// Every URI must be in the catalog; otherwise nothing is written.
    /// Persisted records are replaced, flags recomputed with the same rules
    /// as [`ensure_initialized`](Self::ensure_initialized), and a
    /// notification is published.
    pub async fn set_status(
        &self,
        uris: &[String],
        status: SearchParameterStatus,
    ) -> StorageResult<Vec<Arc<SearchParameterInfo>>> {
        let _guard = self.update_lock.lock().await;
        let snapshot = self.catalog.snapshot();
        let mut records = Vec::with_capacity(uris.len());
        let mut updates = Vec::new();

        for uri in uris {
            let param = snapshot.get(uri).ok_or_else(|| RegistryError::NotFound {
                identifier: uri.clone(),
            })?;

            let record = ResourceSearchParameterStatus {
                uri: uri.clone(),
                status,
                is_partially_supported: param.is_partially_supported,
                last_updated: Utc::now(),
            };
            if let Some(update) = self.reconcile(param, &record)? {
                updates.push(update);
            }
            records.push(record);
        }

        self.store.upsert_statuses(&records).await?;
        let updated = self.catalog.apply(updates)?;
        info!(
            count = records.len(),
            %status,
            updated = updated.len(),
            "Search parameter status changed"
        );

        self.publisher
            .publish(SearchParametersUpdated::new(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Derives flags from a persisted record. Returns the updated
    /// definition when any flag differs from the current one.
    fn reconcile(
        &self,
        param: &SearchParameterInfo,
        record: &ResourceSearchParameterStatus,
    ) -> StorageResult<Option<SearchParameterInfo>> {
        let is_searchable = record.status == SearchParameterStatus::Enabled;
        let is_supported = match record.status {
            SearchParameterStatus::Disabled => self.resolver.is_supported(param)?,
            _ => true,
        };
        let flags = (is_searchable, is_supported, record.is_partially_supported);

        if param.flags() == flags {
            return Ok(None);
        }
        Ok(Some(param.clone().with_flags(
            is_searchable,
            is_supported,
            record.is_partially_supported,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{BroadcastChangePublisher, QueryGeneratorSupportResolver};
    use crate::query::QueryGeneratorRegistry;
    use crate::types::SearchParamType;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<String, ResourceSearchParameterStatus>>,
        hold_reads: AtomicBool,
        read_taken: Notify,
        resume: Notify,
    }

    #[async_trait]
    impl SearchParameterStatusDataStore for MemoryStore {
        async fn get_search_parameter_statuses(
            &self,
        ) -> StorageResult<Vec<ResourceSearchParameterStatus>> {
            let records: Vec<_> = self.records.lock().values().cloned().collect();
            if self.hold_reads.load(Ordering::SeqCst) {
                self.read_taken.notify_one();
                self.resume.notified().await;
            }
            Ok(records)
        }

        async fn insert_new_statuses(
            &self,
            statuses: &[ResourceSearchParameterStatus],
        ) -> StorageResult<usize> {
            let mut records = self.records.lock();
            let mut inserted = 0;
            for s in statuses {
                if !records.contains_key(&s.uri) {
                    records.insert(s.uri.clone(), s.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn upsert_statuses(
            &self,
            statuses: &[ResourceSearchParameterStatus],
        ) -> StorageResult<()> {
            let mut records = self.records.lock();
            for s in statuses {
                records.insert(s.uri.clone(), s.clone());
            }
            Ok(())
        }
    }

    fn name_param() -> SearchParameterInfo {
        SearchParameterInfo::new("http://example.org/name", "name", SearchParamType::String)
    }

    fn query_param() -> SearchParameterInfo {
        SearchParameterInfo::new("http://example.org/query", "_query", SearchParamType::Special)
    }

    fn manager(
        store: Arc<MemoryStore>,
        definitions: Vec<SearchParameterInfo>,
    ) -> (SearchParameterStatusManager, BroadcastChangePublisher) {
        let catalog = SearchParameterCatalog::new(definitions).unwrap();
        let publisher = BroadcastChangePublisher::default();
        let resolver = QueryGeneratorSupportResolver::new(Arc::new(QueryGeneratorRegistry::new()));
        let manager = SearchParameterStatusManager::new(
            store,
            Arc::new(catalog),
            Arc::new(resolver),
            Arc::new(publisher.clone()),
        );
        (manager, publisher)
    }

    #[tokio::test]
    async fn test_new_parameters_are_recorded_as_supported() {
        let store = Arc::new(MemoryStore::default());
        let (manager, publisher) = manager(store.clone(), vec![name_param(), query_param()]);
        let mut rx = publisher.subscribe();

        let updated = manager.ensure_initialized().await.unwrap();
        assert_eq!(updated.len(), 2);

        let records = store.records.lock().clone();
        assert!(
            records
                .values()
                .all(|r| r.status == SearchParameterStatus::Supported)
        );

        let name = manager.catalog().get("http://example.org/name").unwrap();
        assert_eq!(name.flags(), (false, true, false));
        let query = manager.catalog().get("http://example.org/query").unwrap();
        assert_eq!(query.flags(), (false, false, false));

        assert_eq!(rx.recv().await.unwrap().updated.len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_publishes_empty_update() {
        let store = Arc::new(MemoryStore::default());
        let (manager, publisher) = manager(store, vec![name_param()]);
        manager.ensure_initialized().await.unwrap();

        let mut rx = publisher.subscribe();
        let updated = manager.ensure_initialized().await.unwrap();
        assert!(updated.is_empty());
        assert!(rx.recv().await.unwrap().updated.is_empty());
    }

    #[tokio::test]
    async fn test_set_status_enables_parameter() {
        let store = Arc::new(MemoryStore::default());
        let (manager, _publisher) = manager(store.clone(), vec![name_param()]);
        manager.ensure_initialized().await.unwrap();

        let updated = manager
            .set_status(
                &["http://example.org/name".to_string()],
                SearchParameterStatus::Enabled,
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].is_searchable);
        assert_eq!(
            store.records.lock()["http://example.org/name"].status,
            SearchParameterStatus::Enabled
        );
    }

    #[tokio::test]
    async fn test_set_status_unknown_uri_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let (manager, _publisher) = manager(store.clone(), vec![name_param()]);

        let result = manager
            .set_status(
                &["http://example.org/missing".to_string()],
                SearchParameterStatus::Enabled,
            )
            .await;
        assert!(result.is_err());
        assert!(store.records.lock().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_during_reconcile_is_not_overwritten() {
        let store = Arc::new(MemoryStore::default());
        store.hold_reads.store(true, Ordering::SeqCst);
        let (manager, _publisher) = manager(store.clone(), vec![name_param()]);
        let url = "http://example.org/name".to_string();

        let (initialized, enabled) = tokio::join!(manager.ensure_initialized(), async {
            // Reconcile has read the (empty) store and is paused.
            store.read_taken.notified().await;
            let (enabled, _) = tokio::join!(
                manager.set_status(std::slice::from_ref(&url), SearchParameterStatus::Enabled),
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    store.resume.notify_one();
                }
            );
            enabled
        });
        initialized.unwrap();
        enabled.unwrap();

        assert_eq!(
            store.records.lock()[&url].status,
            SearchParameterStatus::Enabled
        );
        assert_eq!(manager.catalog().get(&url).unwrap().flags(), (true, true, false));
    }
}
