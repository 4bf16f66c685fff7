//! Catalog of deployed stored procedures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::procedures::StoredProcedure;
use crate::query::SqlParam;

/// A deployed procedure version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureInfo {
    /// Versioned name, `name_hash`.
    pub full_name: String,

    /// Logical name.
    pub name: String,

    /// Hex SHA-256 of the body.
    pub content_hash: String,

    /// When this version was installed.
    pub installed_at: DateTime<Utc>,
}

/// Stores and runs versioned procedures.
///
/// Installing never replaces or removes another version, so instances
/// running older code keep calling the names they know.
#[async_trait]
pub trait ProcedureStore: Send + Sync {
    /// Returns true if a procedure with this full name is installed.
    async fn exists(&self, full_name: &str) -> StorageResult<bool>;

    /// Installs the procedure if absent. Returns true when this call
    /// installed it.
    async fn install(&self, procedure: &StoredProcedure) -> StorageResult<bool>;

    /// Lists installed procedures, newest first.
    async fn list(&self) -> StorageResult<Vec<ProcedureInfo>>;

    /// Runs an installed procedure with named arguments and returns the
    /// number of affected rows.
    async fn execute(&self, full_name: &str, args: &[(&str, SqlParam)]) -> StorageResult<usize>;
}
