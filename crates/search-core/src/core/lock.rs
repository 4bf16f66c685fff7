//! Lease-based distributed locking.
//!
//! A lock is a named lease held by one owner until it is released or its
//! time-to-live elapses. An expired lease may be taken over by another
//! owner, so a crashed holder never blocks the lock forever.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ConcurrencyError, StorageResult};

/// How a lease was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAcquisition {
    /// The lock was free.
    Acquired,
    /// The previous owner's lease had expired and was taken over.
    TookOverExpired { previous_owner: String },
}

/// A lease-based lock shared by every server instance using one store.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Identifier of this lock holder.
    fn owner_id(&self) -> &str;

    /// Attempts to take the lease once.
    ///
    /// Returns `None` when another owner holds an unexpired lease. Taking
    /// a lease this owner already holds extends it.
    async fn try_acquire(
        &self,
        lock_id: &str,
        ttl: Duration,
    ) -> StorageResult<Option<LockAcquisition>>;

    /// Extends a held lease.
    ///
    /// Fails with [`ConcurrencyError::LeaseLost`] if the lease is no longer
    /// held by this owner.
    async fn renew(&self, lock_id: &str, ttl: Duration) -> StorageResult<()>;

    /// Releases the lease if this owner holds it. Releasing a lock that is
    /// not held is a no-op.
    async fn release(&self, lock_id: &str) -> StorageResult<()>;

    /// Polls [`try_acquire`](Self::try_acquire) until it succeeds or
    /// `timeout` elapses.
    async fn acquire(
        &self,
        lock_id: &str,
        ttl: Duration,
        timeout: Duration,
        retry_interval: Duration,
    ) -> StorageResult<LockAcquisition> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(acquisition) = self.try_acquire(lock_id, ttl).await? {
                return Ok(acquisition);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ConcurrencyError::LockTimeout {
                    lock_id: lock_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into());
            }

            debug!(lock_id, owner = self.owner_id(), "Lock held elsewhere, waiting");
            tokio::time::sleep(retry_interval.min(deadline - now)).await;
        }
    }
}
