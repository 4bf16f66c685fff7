//! Status reconciliation against the SQLite status store.

mod common;

use std::sync::Arc;

use common::*;
use helios_search_core::backends::sqlite::SqliteBackend;
use helios_search_core::core::SearchParameterStatusDataStore;
use helios_search_core::error::{ErrorClass, StorageError};
use helios_search_core::query::QueryGeneratorRegistry;
use helios_search_core::search::{
    InitializationGate, QueryGeneratorSupportResolver, RegistryError,
    ResourceSearchParameterStatus, SearchParameterCatalog, SearchParameterLoader,
    SearchParameterStatus, SearchParameterStatusManager, SearchParameterSupportResolver,
};
use helios_search_core::types::SearchParameterInfo;

fn manager(
    backend: &SqliteBackend,
    definitions: Vec<SearchParameterInfo>,
    resolver: Arc<dyn SearchParameterSupportResolver>,
    publisher: Arc<RecordingPublisher>,
) -> SearchParameterStatusManager {
    SearchParameterStatusManager::new(
        Arc::new(backend.clone()),
        Arc::new(SearchParameterCatalog::new(definitions).expect("valid catalog")),
        resolver,
        publisher,
    )
}

async fn persist(backend: &SqliteBackend, records: &[(String, SearchParameterStatus)]) {
    let statuses: Vec<_> = records
        .iter()
        .map(|(uri, status)| ResourceSearchParameterStatus::new(uri.clone(), *status))
        .collect();
    backend.upsert_statuses(&statuses).await.unwrap();
}

#[tokio::test]
async fn test_reconcile_mixed_catalog() {
    let backend = create_backend();
    persist(
        &backend,
        &[
            (id_param().url, SearchParameterStatus::Enabled),
            (profile_param().url, SearchParameterStatus::Disabled),
        ],
    )
    .await;

    let publisher = RecordingPublisher::new();
    let resolver = Arc::new(MockResolver::supporting([query_param().url]));
    let manager = manager(
        &backend,
        vec![id_param(), profile_param(), query_param()],
        resolver,
        publisher.clone(),
    );

    manager.ensure_initialized().await.unwrap();

    let catalog = manager.catalog();
    assert_eq!(catalog.get(&id_param().url).unwrap().flags(), (true, true, false));
    assert_eq!(catalog.get(&profile_param().url).unwrap().flags(), (false, false, false));
    assert_eq!(catalog.get(&query_param().url).unwrap().flags(), (false, true, false));

    // Only `_query` was new.
    let persisted = backend.get_search_parameter_statuses().await.unwrap();
    assert_eq!(persisted.len(), 3);
    let query = persisted.iter().find(|s| s.uri == query_param().url).unwrap();
    assert_eq!(query.status, SearchParameterStatus::Supported);
    let profile = persisted.iter().find(|s| s.uri == profile_param().url).unwrap();
    assert_eq!(profile.status, SearchParameterStatus::Disabled);

    let mut expected = vec![profile_param().url, query_param().url];
    expected.sort();
    assert_eq!(publisher.events().len(), 1);
    assert_eq!(publisher.last_urls(), expected);
}

#[tokio::test]
async fn test_disabled_parameter_becomes_supported() {
    let backend = create_backend();
    persist(&backend, &[(profile_param().url, SearchParameterStatus::Disabled)]).await;

    let resolver = Arc::new(MockResolver::supporting([profile_param().url]));
    let manager = manager(&backend, vec![profile_param()], resolver, RecordingPublisher::new());

    let updated = manager.ensure_initialized().await.unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].flags(), (false, true, false));

    // Nothing is rewritten for a persisted parameter.
    let persisted = backend.get_search_parameter_statuses().await.unwrap();
    assert_eq!(persisted[0].status, SearchParameterStatus::Disabled);
}

#[tokio::test]
async fn test_new_parameters_discovered_with_registry_resolver() {
    let backend = create_backend();
    let registry = Arc::new(QueryGeneratorRegistry::new());
    let definitions = SearchParameterLoader::new().load_embedded();
    let total = definitions.len();

    let manager = manager(
        &backend,
        definitions,
        Arc::new(QueryGeneratorSupportResolver::new(registry)),
        RecordingPublisher::new(),
    );
    let updated = manager.ensure_initialized().await.unwrap();
    assert_eq!(updated.len(), total);

    let persisted = backend.get_search_parameter_statuses().await.unwrap();
    assert_eq!(persisted.len(), total);
    assert!(
        persisted
            .iter()
            .all(|s| s.status == SearchParameterStatus::Supported)
    );

    let snapshot = manager.catalog().snapshot();
    assert!(snapshot.all().iter().all(|p| !p.is_searchable));
    // Special parameters have no generator.
    let text = snapshot.get_by_code("Patient", "_text").unwrap();
    assert!(!text.is_supported);
    let name = snapshot.get_by_code("Patient", "name").unwrap();
    assert!(name.is_supported);
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let backend = create_backend();
    let publisher = RecordingPublisher::new();
    let resolver = Arc::new(MockResolver::supporting([name_param().url, identifier_param().url]));
    let manager = manager(
        &backend,
        vec![name_param(), identifier_param()],
        resolver,
        publisher.clone(),
    );

    assert_eq!(manager.ensure_initialized().await.unwrap().len(), 2);
    let before = manager.catalog().snapshot();

    let updated = manager.ensure_initialized().await.unwrap();
    assert!(updated.is_empty());
    assert_eq!(publisher.events().len(), 2);
    assert!(publisher.last_urls().is_empty());

    let after = manager.catalog().snapshot();
    for param in before.all() {
        assert_eq!(after.get(&param.url).unwrap().flags(), param.flags());
    }
    assert_eq!(backend.get_search_parameter_statuses().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_set_status_enables_search() {
    let backend = create_backend();
    let resolver = Arc::new(MockResolver::supporting([name_param().url]));
    let publisher = RecordingPublisher::new();
    let manager = manager(&backend, vec![name_param()], resolver, publisher.clone());
    manager.ensure_initialized().await.unwrap();

    let updated = manager
        .set_status(&[name_param().url], SearchParameterStatus::Enabled)
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert!(manager.catalog().get(&name_param().url).unwrap().is_searchable);
    assert_eq!(publisher.last_urls(), vec![name_param().url]);

    let persisted = backend.get_search_parameter_statuses().await.unwrap();
    assert_eq!(persisted[0].status, SearchParameterStatus::Enabled);

    // A fresh instance over the same store picks the status up.
    let fresh = self::manager(
        &backend,
        vec![name_param()],
        Arc::new(MockResolver::default()),
        RecordingPublisher::new(),
    );
    fresh.ensure_initialized().await.unwrap();
    assert_eq!(
        fresh.catalog().get(&name_param().url).unwrap().flags(),
        (true, true, false)
    );
}

#[tokio::test]
async fn test_set_status_unknown_uri() {
    let backend = create_backend();
    let manager = manager(
        &backend,
        vec![name_param()],
        Arc::new(MockResolver::default()),
        RecordingPublisher::new(),
    );

    let err = manager
        .set_status(
            &[name_param().url, "http://example.org/unknown".to_string()],
            SearchParameterStatus::Enabled,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Registry(RegistryError::NotFound { .. })));
    assert_eq!(err.class(), ErrorClass::Reconciliation);
    assert!(backend.get_search_parameter_statuses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_instances_share_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.db");
    let first = file_backend(&path);
    let second = file_backend(&path);

    let definitions = vec![id_param(), name_param(), identifier_param()];
    let resolver: Arc<dyn SearchParameterSupportResolver> =
        Arc::new(QueryGeneratorSupportResolver::new(Arc::new(QueryGeneratorRegistry::new())));
    let a = manager(&first, definitions.clone(), resolver.clone(), RecordingPublisher::new());
    let b = manager(&second, definitions, resolver, RecordingPublisher::new());

    let (ra, rb) = tokio::join!(a.ensure_initialized(), b.ensure_initialized());
    ra.unwrap();
    rb.unwrap();

    let persisted = first.get_search_parameter_statuses().await.unwrap();
    assert_eq!(persisted.len(), 3);
    for param in a.catalog().snapshot().all() {
        assert_eq!(
            b.catalog().get(&param.url).unwrap().flags(),
            param.flags(),
            "{}",
            param.url
        );
    }
}

#[tokio::test]
async fn test_initialization_gate_runs_once() {
    let backend = create_backend();
    let publisher = RecordingPublisher::new();
    let manager = Arc::new(manager(
        &backend,
        vec![name_param()],
        Arc::new(MockResolver::supporting([name_param().url])),
        publisher.clone(),
    ));

    let gate = InitializationGate::new(manager);
    assert!(!gate.is_initialized());

    let (a, b) = tokio::join!(gate.ensure_initialized(), gate.ensure_initialized());
    a.unwrap();
    b.unwrap();
    gate.ensure_initialized().await.unwrap();

    assert!(gate.is_initialized());
    assert_eq!(publisher.events().len(), 1);
}

#[tokio::test]
async fn test_resolver_failure_leaves_store_and_catalog_untouched() {
    let backend = create_backend();
    let publisher = RecordingPublisher::new();
    let manager = manager(
        &backend,
        vec![id_param(), name_param()],
        Arc::new(MockResolver::failing()),
        publisher.clone(),
    );

    let err = manager.ensure_initialized().await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Registry(RegistryError::SupportResolution { .. })
    ));
    assert_eq!(err.class(), ErrorClass::Reconciliation);

    assert!(backend.get_search_parameter_statuses().await.unwrap().is_empty());
    for param in [id_param(), name_param()] {
        assert_eq!(
            manager.catalog().get(&param.url).unwrap().flags(),
            (true, true, false)
        );
    }
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn test_store_failure_leaves_catalog_untouched() {
    let backend = create_backend();
    let publisher = RecordingPublisher::new();
    let manager = SearchParameterStatusManager::new(
        Arc::new(ReadOnlyStatusStore {
            inner: backend.clone(),
        }),
        Arc::new(SearchParameterCatalog::new(vec![name_param()]).expect("valid catalog")),
        Arc::new(MockResolver::supporting([name_param().url])),
        publisher.clone(),
    );

    let err = manager.ensure_initialized().await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
    assert!(err.is_retryable());

    assert_eq!(
        manager.catalog().get(&name_param().url).unwrap().flags(),
        (true, true, false)
    );
    assert!(publisher.events().is_empty());

    let err = manager
        .set_status(&[name_param().url], SearchParameterStatus::Enabled)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn test_initialization_gate_reopens_after_failure() {
    let backend = create_backend();
    let publisher = RecordingPublisher::new();
    let resolver = Arc::new(MockResolver::failing());
    let manager = Arc::new(manager(
        &backend,
        vec![name_param()],
        resolver.clone(),
        publisher.clone(),
    ));
    let gate = InitializationGate::new(manager.clone());

    assert!(gate.ensure_initialized().await.is_err());
    assert!(!gate.is_initialized());
    assert!(publisher.events().is_empty());

    resolver.set_failing(false);
    gate.ensure_initialized().await.unwrap();
    assert!(gate.is_initialized());
    assert_eq!(publisher.events().len(), 1);
    assert_eq!(backend.get_search_parameter_statuses().await.unwrap().len(), 1);
}
