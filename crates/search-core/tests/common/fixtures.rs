//! Backends, catalogs and collaborators used across the integration tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use helios_search_core::backends::sqlite::SqliteBackend;
use helios_search_core::core::SearchParameterStatusDataStore;
use helios_search_core::error::{BackendError, StorageResult};
use helios_search_core::search::{
    RegistryError, ResourceSearchParameterStatus, SearchParameterChangePublisher,
    SearchParameterSupportResolver, SearchParametersUpdated,
};
use helios_search_core::types::{SearchParamType, SearchParameterComponent, SearchParameterInfo};

pub const FHIR_SP: &str = "http://hl7.org/fhir/SearchParameter";

/// Creates an in-memory backend with the current schema.
pub fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

/// Opens (and initializes) a file backend, shared by every caller using `path`.
pub fn file_backend(path: &Path) -> SqliteBackend {
    let backend = SqliteBackend::open(path).expect("Failed to open SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

/// Canonical URL of a core parameter.
pub fn sp_url(name: &str) -> String {
    format!("{}/{}", FHIR_SP, name)
}

/// Builds a parameter definition on `base`.
pub fn param(name: &str, code: &str, param_type: SearchParamType, base: &str) -> SearchParameterInfo {
    SearchParameterInfo::new(sp_url(name), code, param_type).with_base([base])
}

pub fn id_param() -> SearchParameterInfo {
    param("Resource-id", "_id", SearchParamType::Token, "Resource")
}

pub fn profile_param() -> SearchParameterInfo {
    param("Resource-profile", "_profile", SearchParamType::Uri, "Resource")
}

pub fn query_param() -> SearchParameterInfo {
    param("Resource-query", "_query", SearchParamType::Special, "Resource")
}

pub fn name_param() -> SearchParameterInfo {
    param("Patient-name", "name", SearchParamType::String, "Patient")
}

pub fn identifier_param() -> SearchParameterInfo {
    param("Patient-identifier", "identifier", SearchParamType::Token, "Patient")
}

/// A composite of two previously defined parameters.
pub fn composite_param(
    name: &str,
    code: &str,
    base: &str,
    components: &[(&str, SearchParamType)],
) -> SearchParameterInfo {
    components.iter().fold(
        param(name, code, SearchParamType::Composite, base),
        |p, (definition, t)| {
            p.with_component(SearchParameterComponent::new(sp_url(definition)).with_type(*t))
        },
    )
}

/// Resolver answering from a fixed set of supported URLs.
#[derive(Debug, Default)]
pub struct MockResolver {
    supported: HashSet<String>,
    failing: AtomicBool,
}

impl MockResolver {
    pub fn supporting<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: urls.into_iter().map(Into::into).collect(),
            failing: AtomicBool::new(false),
        }
    }

    /// A resolver that errors on every parameter until [`set_failing`](Self::set_failing) clears it.
    pub fn failing() -> Self {
        let resolver = Self::supporting(Vec::<String>::new());
        resolver.set_failing(true);
        resolver
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SearchParameterSupportResolver for MockResolver {
    fn is_supported(&self, parameter: &SearchParameterInfo) -> StorageResult<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::SupportResolution {
                url: parameter.url.clone(),
                message: "resolver unavailable".to_string(),
            }
            .into());
        }
        Ok(self.supported.contains(&parameter.url))
    }
}

/// Publisher keeping every event it receives.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<SearchParametersUpdated>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SearchParametersUpdated> {
        self.events.lock().clone()
    }

    /// URLs of the most recent event, sorted.
    pub fn last_urls(&self) -> Vec<String> {
        let events = self.events.lock();
        let mut urls: Vec<String> = events
            .last()
            .map(|e| e.urls().into_iter().map(String::from).collect())
            .unwrap_or_default();
        urls.sort();
        urls
    }
}

#[async_trait]
impl SearchParameterChangePublisher for RecordingPublisher {
    async fn publish(&self, event: SearchParametersUpdated) {
        self.events.lock().push(event);
    }
}

/// Status store that reads from `inner` but refuses every write.
pub struct ReadOnlyStatusStore {
    pub inner: SqliteBackend,
}

impl ReadOnlyStatusStore {
    fn refuse() -> BackendError {
        BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: "database is read-only".to_string(),
        }
    }
}

#[async_trait]
impl SearchParameterStatusDataStore for ReadOnlyStatusStore {
    async fn get_search_parameter_statuses(
        &self,
    ) -> StorageResult<Vec<ResourceSearchParameterStatus>> {
        self.inner.get_search_parameter_statuses().await
    }

    async fn insert_new_statuses(
        &self,
        _statuses: &[ResourceSearchParameterStatus],
    ) -> StorageResult<usize> {
        Err(Self::refuse().into())
    }

    async fn upsert_statuses(
        &self,
        _statuses: &[ResourceSearchParameterStatus],
    ) -> StorageResult<()> {
        Err(Self::refuse().into())
    }
}
