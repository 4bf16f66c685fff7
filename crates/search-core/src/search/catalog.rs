//! In-memory catalog of search parameters.
//!
//! The catalog holds an immutable [`CatalogSnapshot`] behind a lock. Readers
//! clone the `Arc` of the current snapshot; writers build a complete new
//! snapshot and swap it in, so no reader ever sees a half-applied update.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::SearchParameterInfo;

use super::errors::RegistryError;

/// An immutable view of every catalog parameter.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    params: Vec<Arc<SearchParameterInfo>>,
    by_url: HashMap<String, usize>,
}

impl CatalogSnapshot {
    fn build(params: Vec<Arc<SearchParameterInfo>>) -> Self {
        let by_url = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.url.clone(), i))
            .collect();
        Self { params, by_url }
    }

    /// Returns a parameter by canonical URL.
    pub fn get(&self, url: &str) -> Option<&Arc<SearchParameterInfo>> {
        self.by_url.get(url).map(|&i| &self.params[i])
    }

    /// Returns the parameter with `code` that applies to `resource_type`.
    pub fn get_by_code(&self, resource_type: &str, code: &str) -> Option<&Arc<SearchParameterInfo>> {
        self.params
            .iter()
            .find(|p| p.code == code && p.applies_to(resource_type))
    }

    /// Every parameter, in load order.
    pub fn all(&self) -> &[Arc<SearchParameterInfo>] {
        &self.params
    }

    /// Searchable parameters applying to `resource_type`.
    pub fn searchable(&self, resource_type: &str) -> Vec<Arc<SearchParameterInfo>> {
        self.params
            .iter()
            .filter(|p| p.is_searchable && p.applies_to(resource_type))
            .cloned()
            .collect()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Process-lifetime catalog of search parameter definitions.
#[derive(Debug, Default)]
pub struct SearchParameterCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl SearchParameterCatalog {
    /// Builds a catalog from definitions.
    ///
    /// Composite component types are resolved from the referenced
    /// definitions. Duplicate URLs are rejected.
    pub fn new(definitions: Vec<SearchParameterInfo>) -> Result<Self, RegistryError> {
        let mut seen = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if seen.insert(def.url.clone(), i).is_some() {
                return Err(RegistryError::DuplicateUrl {
                    url: def.url.clone(),
                });
            }
        }

        let types: HashMap<String, _> = definitions
            .iter()
            .map(|d| (d.url.clone(), d.param_type))
            .collect();

        let params = definitions
            .into_iter()
            .map(|mut def| {
                for component in &mut def.components {
                    if component.param_type.is_none() {
                        component.param_type = types.get(&component.definition).copied();
                    }
                }
                Arc::new(def)
            })
            .collect();

        Ok(Self {
            current: RwLock::new(Arc::new(CatalogSnapshot::build(params))),
        })
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    /// Returns a parameter by canonical URL.
    pub fn get(&self, url: &str) -> Option<Arc<SearchParameterInfo>> {
        self.snapshot().get(url).cloned()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Replaces the records for the given URLs and swaps in the new snapshot.
    ///
    /// Records whose URL is not in the catalog are rejected before anything
    /// is swapped. Returns the new records in the order given.
    pub fn apply(
        &self,
        updates: Vec<SearchParameterInfo>,
    ) -> Result<Vec<Arc<SearchParameterInfo>>, RegistryError> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let mut current = self.current.write();
        let mut params = current.params.clone();
        let mut applied = Vec::with_capacity(updates.len());

        for update in updates {
            let index = *current
                .by_url
                .get(&update.url)
                .ok_or_else(|| RegistryError::NotFound {
                    identifier: update.url.clone(),
                })?;
            let update = Arc::new(update);
            params[index] = Arc::clone(&update);
            applied.push(update);
        }

        *current = Arc::new(CatalogSnapshot::build(params));
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchParamType, SearchParameterComponent};

    fn defs() -> Vec<SearchParameterInfo> {
        vec![
            SearchParameterInfo::new("http://example.org/code", "code", SearchParamType::Token)
                .with_base(["Observation"]),
            SearchParameterInfo::new("http://example.org/value", "value", SearchParamType::Quantity)
                .with_base(["Observation"]),
            SearchParameterInfo::new(
                "http://example.org/code-value",
                "code-value",
                SearchParamType::Composite,
            )
            .with_base(["Observation"])
            .with_component(SearchParameterComponent::new("http://example.org/code"))
            .with_component(SearchParameterComponent::new("http://example.org/value")),
        ]
    }

    #[test]
    fn test_component_types_resolved() {
        let catalog = SearchParameterCatalog::new(defs()).unwrap();
        let composite = catalog.get("http://example.org/code-value").unwrap();
        assert_eq!(
            composite.component_types(),
            vec![Some(SearchParamType::Token), Some(SearchParamType::Quantity)]
        );
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let mut definitions = defs();
        definitions.push(definitions[0].clone());
        assert!(matches!(
            SearchParameterCatalog::new(definitions),
            Err(RegistryError::DuplicateUrl { .. })
        ));
    }

    #[test]
    fn test_apply_swaps_snapshot() {
        let catalog = SearchParameterCatalog::new(defs()).unwrap();
        let before = catalog.snapshot();

        let updated = before
            .get("http://example.org/code")
            .map(|p| (**p).clone().with_flags(false, true, false))
            .unwrap();
        let applied = catalog.apply(vec![updated]).unwrap();
        assert_eq!(applied.len(), 1);

        // The old snapshot is untouched; the new one carries the update.
        assert!(before.get("http://example.org/code").unwrap().is_searchable);
        assert!(!catalog.get("http://example.org/code").unwrap().is_searchable);
        assert_eq!(catalog.snapshot().searchable("Observation").len(), 2);
    }

    #[test]
    fn test_apply_unknown_url_leaves_catalog_unchanged() {
        let catalog = SearchParameterCatalog::new(defs()).unwrap();
        let unknown =
            SearchParameterInfo::new("http://example.org/other", "other", SearchParamType::Uri);
        let known = catalog
            .get("http://example.org/code")
            .map(|p| (*p).clone().with_flags(false, false, false))
            .unwrap();

        assert!(catalog.apply(vec![known, unknown]).is_err());
        assert!(catalog.get("http://example.org/code").unwrap().is_searchable);
    }

    #[test]
    fn test_get_by_code() {
        let catalog = SearchParameterCatalog::new(defs()).unwrap();
        let snapshot = catalog.snapshot();
        assert!(snapshot.get_by_code("Observation", "code").is_some());
        assert!(snapshot.get_by_code("Patient", "code").is_none());
    }
}
