//! Lock-guarded schema and procedure upgrades.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::LockConfig;
use crate::core::{DistributedLock, LockAcquisition, ProcedureStore};
use crate::error::{ConcurrencyError, StorageError, StorageResult};

use super::procedure::StoredProcedure;

/// Name of the lock serializing upgrades across instances.
pub const UPGRADE_LOCK_ID: &str = "schema-upgrade";

/// Brings the store schema to the version this build expects.
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    /// Applies pending migrations and returns the resulting version.
    async fn migrate(&self) -> StorageResult<i32>;
}

/// Result of [`UpgradeManager::setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// This instance held the lock and ran the upgrade.
    Applied {
        schema_version: i32,
        /// Full names installed by this call.
        installed: Vec<String>,
        /// True when the lock was taken over from an expired lease.
        took_over: bool,
    },
    /// Another instance held the lock, but every procedure was already
    /// deployed.
    AlreadyApplied,
}

/// Deploys schema migrations and versioned procedures under the
/// `schema-upgrade` lock.
pub struct UpgradeManager {
    lock: Arc<dyn DistributedLock>,
    store: Arc<dyn ProcedureStore>,
    migrator: Arc<dyn SchemaMigrator>,
    procedures: Vec<StoredProcedure>,
    config: LockConfig,
}

impl std::fmt::Debug for UpgradeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeManager")
            .field("owner", &self.lock.owner_id())
            .field(
                "procedures",
                &self
                    .procedures
                    .iter()
                    .map(StoredProcedure::full_name)
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UpgradeManager {
    /// Creates an upgrade manager for a set of procedures.
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        store: Arc<dyn ProcedureStore>,
        migrator: Arc<dyn SchemaMigrator>,
        procedures: Vec<StoredProcedure>,
    ) -> Self {
        Self {
            lock,
            store,
            migrator,
            procedures,
            config: LockConfig::default(),
        }
    }

    /// Sets the lock timings.
    pub fn with_lock_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// The procedures this manager deploys.
    pub fn procedures(&self) -> &[StoredProcedure] {
        &self.procedures
    }

    /// Runs migrations and installs missing procedures.
    ///
    /// If the lock cannot be acquired in time and every procedure is
    /// already installed, returns [`UpgradeOutcome::AlreadyApplied`];
    /// otherwise the lock timeout is returned and may be retried.
    pub async fn setup(&self) -> StorageResult<UpgradeOutcome> {
        let acquisition = match self
            .lock
            .acquire(
                UPGRADE_LOCK_ID,
                self.config.lease_ttl,
                self.config.acquire_timeout,
                self.config.retry_interval,
            )
            .await
        {
            Ok(acquisition) => acquisition,
            Err(StorageError::Concurrency(ConcurrencyError::LockTimeout {
                lock_id,
                timeout_ms,
            })) => {
                if self.all_deployed().await? {
                    info!(lock_id, "Upgrade lock busy, procedures already deployed");
                    return Ok(UpgradeOutcome::AlreadyApplied);
                }
                return Err(ConcurrencyError::LockTimeout {
                    lock_id,
                    timeout_ms,
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        let took_over = match &acquisition {
            LockAcquisition::Acquired => false,
            LockAcquisition::TookOverExpired { previous_owner } => {
                warn!(
                    lock_id = UPGRADE_LOCK_ID,
                    previous_owner, "Took over expired upgrade lock"
                );
                true
            }
        };

        let result = self.apply(took_over).await;

        if let Err(e) = self.lock.release(UPGRADE_LOCK_ID).await {
            warn!(lock_id = UPGRADE_LOCK_ID, error = %e, "Failed to release upgrade lock");
        }

        result
    }

    /// Returns true when every procedure is installed.
    pub async fn all_deployed(&self) -> StorageResult<bool> {
        for procedure in &self.procedures {
            if !self.store.exists(procedure.full_name()).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn apply(&self, took_over: bool) -> StorageResult<UpgradeOutcome> {
        let schema_version = self.migrator.migrate().await?;
        self.lock
            .renew(UPGRADE_LOCK_ID, self.config.lease_ttl)
            .await?;

        let mut installed = Vec::new();
        for procedure in &self.procedures {
            if self.store.install(procedure).await? {
                info!(
                    name = procedure.name(),
                    full_name = procedure.full_name(),
                    "Installed stored procedure"
                );
                installed.push(procedure.full_name().to_string());
            }
            self.lock
                .renew(UPGRADE_LOCK_ID, self.config.lease_ttl)
                .await?;
        }

        info!(
            schema_version,
            installed = installed.len(),
            "Upgrade complete"
        );
        Ok(UpgradeOutcome::Applied {
            schema_version,
            installed,
            took_over,
        })
    }
}
