//! Decides whether the current backend can serve a search parameter.

use std::sync::Arc;

use crate::error::StorageResult;
use crate::query::QueryGeneratorRegistry;
use crate::types::SearchParameterInfo;

/// Answers whether a search parameter can be translated by this backend.
pub trait SearchParameterSupportResolver: Send + Sync {
    /// Returns true if queries on `parameter` can be generated.
    fn is_supported(&self, parameter: &SearchParameterInfo) -> StorageResult<bool>;
}

/// Support is decided by the query generator registry: a parameter is
/// supported when some generator can serve its category.
#[derive(Debug, Clone)]
pub struct QueryGeneratorSupportResolver {
    registry: Arc<QueryGeneratorRegistry>,
}

impl QueryGeneratorSupportResolver {
    /// Creates a resolver over a registry.
    pub fn new(registry: Arc<QueryGeneratorRegistry>) -> Self {
        Self { registry }
    }
}

impl SearchParameterSupportResolver for QueryGeneratorSupportResolver {
    fn is_supported(&self, parameter: &SearchParameterInfo) -> StorageResult<bool> {
        Ok(self.registry.resolve(parameter).is_some())
    }
}
