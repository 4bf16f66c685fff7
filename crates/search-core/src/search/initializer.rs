//! Runs status reconciliation once, before the first search is served.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::StorageResult;

use super::status_manager::SearchParameterStatusManager;

/// First-request gate around [`SearchParameterStatusManager::ensure_initialized`].
///
/// Concurrent callers wait for a single reconciliation. If it fails the
/// gate stays closed and the next caller tries again.
#[derive(Debug)]
pub struct InitializationGate {
    manager: Arc<SearchParameterStatusManager>,
    initialized: OnceCell<()>,
}

impl InitializationGate {
    /// Creates a closed gate.
    pub fn new(manager: Arc<SearchParameterStatusManager>) -> Self {
        Self {
            manager,
            initialized: OnceCell::new(),
        }
    }

    /// Reconciles statuses unless a previous call already succeeded.
    pub async fn ensure_initialized(&self) -> StorageResult<()> {
        self.initialized
            .get_or_try_init(|| async {
                self.manager.ensure_initialized().await.map(|_| ()).map_err(|e| {
                    warn!(error = %e, "Search parameter initialization failed");
                    e
                })
            })
            .await
            .map(|_| ())
    }

    /// Returns true once initialization has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }
}
