//! Lease-based lock stored in the `distributed_lock` table.
//!
//! Each decision runs in an `IMMEDIATE` transaction, so two instances
//! sharing a database file never both see a lock as free.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::core::{DistributedLock, LockAcquisition};
use crate::error::{ConcurrencyError, StorageResult};

use super::SqliteBackend;

/// A [`DistributedLock`] holder backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteDistributedLock {
    backend: SqliteBackend,
    owner_id: String,
}

impl SqliteDistributedLock {
    /// Creates a lock holder with a random owner id.
    pub fn new(backend: SqliteBackend) -> Self {
        Self::with_owner(backend, uuid::Uuid::new_v4().to_string())
    }

    /// Creates a lock holder with an explicit owner id.
    pub fn with_owner(backend: SqliteBackend, owner_id: impl Into<String>) -> Self {
        Self {
            backend,
            owner_id: owner_id.into(),
        }
    }
}

/// Epoch-millis expiry of a lease taken at `now`, saturating for huge TTLs.
fn lease_expiry(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

#[async_trait]
impl DistributedLock for SqliteDistributedLock {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    async fn try_acquire(
        &self,
        lock_id: &str,
        ttl: Duration,
    ) -> StorageResult<Option<LockAcquisition>> {
        let mut conn = self.backend.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now().timestamp_millis();
        let expires_at = lease_expiry(now, ttl);

        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT owner_id, expires_at FROM distributed_lock WHERE lock_id = ?1",
                [lock_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match current {
            None => {
                tx.execute(
                    "INSERT INTO distributed_lock (lock_id, owner_id, acquired_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![lock_id, self.owner_id, now, expires_at],
                )?;
                Some(LockAcquisition::Acquired)
            }
            Some((owner, _)) if owner == self.owner_id => {
                tx.execute(
                    "UPDATE distributed_lock SET expires_at = ?2 WHERE lock_id = ?1",
                    params![lock_id, expires_at],
                )?;
                Some(LockAcquisition::Acquired)
            }
            Some((owner, previous_expiry)) if previous_expiry <= now => {
                tx.execute(
                    "UPDATE distributed_lock
                     SET owner_id = ?2, acquired_at = ?3, expires_at = ?4
                     WHERE lock_id = ?1 AND owner_id = ?5",
                    params![lock_id, self.owner_id, now, expires_at, owner],
                )?;
                Some(LockAcquisition::TookOverExpired {
                    previous_owner: owner,
                })
            }
            Some(_) => None,
        };

        tx.commit()?;

        debug!(
            lock_id,
            owner = %self.owner_id,
            acquired = outcome.is_some(),
            "Lock acquisition attempt"
        );
        Ok(outcome)
    }

    async fn renew(&self, lock_id: &str, ttl: Duration) -> StorageResult<()> {
        let conn = self.backend.get_connection()?;
        let now = Utc::now().timestamp_millis();

        let updated = conn.execute(
            "UPDATE distributed_lock SET expires_at = ?3
             WHERE lock_id = ?1 AND owner_id = ?2 AND expires_at > ?4",
            params![lock_id, self.owner_id, lease_expiry(now, ttl), now],
        )?;

        if updated == 0 {
            return Err(ConcurrencyError::LeaseLost {
                lock_id: lock_id.to_string(),
                owner_id: self.owner_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn release(&self, lock_id: &str) -> StorageResult<()> {
        let conn = self.backend.get_connection()?;
        let deleted = conn.execute(
            "DELETE FROM distributed_lock WHERE lock_id = ?1 AND owner_id = ?2",
            params![lock_id, self.owner_id],
        )?;
        debug!(lock_id, owner = %self.owner_id, released = deleted > 0, "Lock released");
        Ok(())
    }
}
