//! Stored procedure catalog and schema migration.
//!
//! SQLite has no server-side procedures, so bodies are stored in the
//! `stored_procedure` table and run statement by statement inside one
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::core::{ProcedureInfo, ProcedureStore};
use crate::error::{ProcedureError, StorageError, StorageResult};
use crate::procedures::{SchemaMigrator, StoredProcedure, builtin};
use crate::query::SqlParam;

use super::SqliteBackend;

#[async_trait]
impl ProcedureStore for SqliteBackend {
    async fn exists(&self, full_name: &str) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM stored_procedure WHERE full_name = ?1",
                [full_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn install(&self, procedure: &StoredProcedure) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO stored_procedure
             (full_name, name, content_hash, body, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                procedure.full_name(),
                procedure.name(),
                procedure.content_hash(),
                procedure.body(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn list(&self) -> StorageResult<Vec<ProcedureInfo>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT full_name, name, content_hash, installed_at
             FROM stored_procedure ORDER BY installed_at DESC, full_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut procedures = Vec::new();
        for row in rows {
            let (full_name, name, content_hash, installed_at) = row?;
            procedures.push(ProcedureInfo {
                full_name,
                name,
                content_hash,
                installed_at: DateTime::parse_from_rfc3339(&installed_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            });
        }
        Ok(procedures)
    }

    async fn execute(&self, full_name: &str, args: &[(&str, SqlParam)]) -> StorageResult<usize> {
        let mut conn = self.get_connection()?;

        let body: String = conn
            .query_row(
                "SELECT body FROM stored_procedure WHERE full_name = ?1",
                [full_name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ProcedureError::NotInstalled {
                full_name: full_name.to_string(),
            })?;

        let failed = |e: rusqlite::Error| {
            StorageError::Procedure(ProcedureError::ExecutionFailed {
                full_name: full_name.to_string(),
                message: e.to_string(),
            })
        };

        let tx = conn.transaction()?;
        let mut affected = 0;
        for sql in builtin::statements(&body) {
            let mut stmt = tx.prepare(sql).map_err(failed)?;
            for (name, value) in args {
                let key = format!(":{}", name.trim_start_matches(':'));
                if let Some(index) = stmt.parameter_index(&key).map_err(failed)? {
                    stmt.raw_bind_parameter(index, value).map_err(failed)?;
                }
            }
            affected += stmt.raw_execute().map_err(failed)?;
        }
        tx.commit()?;

        debug!(full_name, affected, "Executed stored procedure");
        Ok(affected)
    }
}

#[async_trait]
impl SchemaMigrator for SqliteBackend {
    async fn migrate(&self) -> StorageResult<i32> {
        self.init_schema()
    }
}
