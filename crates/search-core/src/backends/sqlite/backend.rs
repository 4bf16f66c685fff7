//! SQLite backend: connection pool and configuration.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BackendError, StorageError, StorageResult};
use crate::query::SystemIdCache;

use super::schema;

pub(crate) const BACKEND_NAME: &str = "sqlite";

/// SQLite store for search indexes, parameter statuses, locks and
/// procedures.
///
/// Cloning is cheap; clones share the pool and the system id cache.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
    system_cache: Arc<SystemIdCache>,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("cached_systems", &self.system_cache.len())
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteBackend {
    /// Creates an in-memory database.
    ///
    /// The pool holds a single connection that is never recycled, since
    /// every SQLite in-memory connection is its own database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms as u64);
        let enable_foreign_keys = config.enable_foreign_keys;
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if enable_foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        let builder = Pool::builder().connection_timeout(Duration::from_millis(
            config.connection_timeout_ms,
        ));
        let builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            builder
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })?;

        let backend = Self {
            pool,
            config,
            is_memory,
            system_cache: Arc::new(SystemIdCache::new()),
        };

        backend.configure_journal()?;

        Ok(backend)
    }

    /// Creates or migrates the schema and returns its version.
    pub fn init_schema(&self) -> StorageResult<i32> {
        let version = {
            let conn = self.get_connection()?;
            schema::initialize_schema(&conn)?
        };
        self.load_system_cache()?;
        Ok(version)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// The connection pool.
    pub(crate) fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }

    /// Switches file databases to WAL; the journal mode is persistent, so
    /// one connection is enough.
    fn configure_journal(&self) -> StorageResult<()> {
        if self.config.enable_wal && !self.is_memory {
            let conn = self.get_connection()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| {
                    StorageError::Backend(BackendError::Internal {
                        backend_name: BACKEND_NAME.to_string(),
                        message: format!("Failed to enable WAL mode: {}", e),
                        source: None,
                    })
                })?;
        }
        Ok(())
    }

    /// Fills the system id cache from the `system` table.
    pub fn load_system_cache(&self) -> StorageResult<usize> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT system_id, value FROM system")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut count = 0;
        for row in rows {
            let (id, value) = row?;
            self.system_cache.insert(value, id);
            count += 1;
        }
        info!(systems = count, "Loaded system id cache");
        Ok(count)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    /// Returns the shared system id cache.
    pub fn system_cache(&self) -> &Arc<SystemIdCache> {
        &self.system_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_keeps_data_across_checkouts() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();

        {
            let conn = backend.get_connection().unwrap();
            conn.execute("INSERT INTO system (value) VALUES ('http://loinc.org')", [])
                .unwrap();
        }

        assert_eq!(backend.load_system_cache().unwrap(), 1);
        assert!(backend.system_cache().get("http://loinc.org").is_some());
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("search.db")).unwrap();
        assert!(!backend.is_memory());
        assert_eq!(backend.init_schema().unwrap(), schema::SCHEMA_VERSION);
    }
}
