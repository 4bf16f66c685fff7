//! In-memory cache of system URI to system id mappings.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Caches the surrogate ids of code system URIs.
///
/// The cache is deliberately partial: a miss is not an error, it only means
/// the query generator falls back to a sub-query against the system table.
#[derive(Debug, Default)]
pub struct SystemIdCache {
    entries: RwLock<HashMap<String, i64>>,
}

impl SystemIdCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the id for a system URI.
    pub fn get(&self, system: &str) -> Option<i64> {
        self.entries.read().get(system).copied()
    }

    /// Records the id for a system URI.
    pub fn insert(&self, system: impl Into<String>, id: i64) {
        self.entries.write().insert(system.into(), id);
    }

    /// Number of cached systems.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = SystemIdCache::new();
        assert!(cache.is_empty());
        cache.insert("http://loinc.org", 7);
        assert_eq!(cache.get("http://loinc.org"), Some(7));
        assert_eq!(cache.get("http://snomed.info/sct"), None);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
