//! SQLite schema definitions and migrations.
//!
//! Version history:
//! - v1: resource table, system table, search index tables, parameter statuses
//! - v2: stored procedure catalog, distributed locks, partial index on
//!   `is_longer_than_a_day`

use rusqlite::Connection;
use tracing::info;

use crate::error::{BackendError, StorageError, StorageResult};
use crate::query::tables::{self, INDEX_TABLES, RESOURCE_SURROGATE_ID, SEARCH_PARAM_URI};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Creates or migrates the schema and returns the resulting version.
pub fn initialize_schema(conn: &Connection) -> StorageResult<i32> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(BackendError::SchemaMismatch {
            found: current_version,
            supported: SCHEMA_VERSION,
        }
        .into());
    }

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(SCHEMA_VERSION)
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    let mut sql = String::from(
        "
        CREATE TABLE IF NOT EXISTS resource (
            resource_surrogate_id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            last_updated INTEGER NOT NULL,
            raw_resource TEXT NOT NULL,
            is_history INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_resource_type_id
            ON resource(resource_type, resource_id, is_history);

        CREATE TABLE IF NOT EXISTS system (
            system_id INTEGER PRIMARY KEY AUTOINCREMENT,
            value TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS search_parameter_status (
            uri TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            is_partially_supported INTEGER NOT NULL DEFAULT 0,
            last_updated TEXT NOT NULL
        );
        ",
    );

    for table in INDEX_TABLES {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                {id} INTEGER NOT NULL,
                {uri} TEXT NOT NULL,
                {columns}
            );
            CREATE INDEX IF NOT EXISTS idx_{name}_resource ON {name}({id}, {uri});
            ",
            name = table.name,
            id = RESOURCE_SURROGATE_ID,
            uri = SEARCH_PARAM_URI,
            columns = index_columns(table.name).join(",\n                "),
        ));
    }

    conn.execute_batch(&sql)
        .map_err(|e| internal(format!("Failed to create schema v1: {}", e)))?;
    Ok(())
}

/// Column definitions of an index table, excluding the shared key columns.
fn index_columns(table: &str) -> Vec<String> {
    fn token(i: &str) -> Vec<String> {
        vec![
            format!("{}{} INTEGER", tables::token::SYSTEM_ID, i),
            format!("{}{} TEXT", tables::token::CODE, i),
        ]
    }
    fn string(i: &str) -> Vec<String> {
        vec![
            format!("{}{} TEXT", tables::string::TEXT, i),
            format!("{}{} TEXT", tables::string::TEXT_NORMALIZED, i),
        ]
    }
    fn date_time(i: &str) -> Vec<String> {
        vec![
            format!("{}{} INTEGER", tables::date_time::START_DATE_TIME, i),
            format!("{}{} INTEGER", tables::date_time::END_DATE_TIME, i),
            format!(
                "{}{} INTEGER NOT NULL DEFAULT 0",
                tables::date_time::IS_LONGER_THAN_A_DAY,
                i
            ),
        ]
    }
    fn number(i: &str) -> Vec<String> {
        vec![
            format!("{}{} REAL", tables::number::SINGLE_VALUE, i),
            format!("{}{} REAL", tables::number::LOW_VALUE, i),
            format!("{}{} REAL", tables::number::HIGH_VALUE, i),
        ]
    }
    fn quantity(i: &str) -> Vec<String> {
        let mut columns = vec![
            format!("{}{} INTEGER", tables::quantity::SYSTEM_ID, i),
            format!("{}{} TEXT", tables::quantity::QUANTITY_CODE, i),
        ];
        columns.extend(number(i));
        columns
    }
    fn reference(i: &str) -> Vec<String> {
        vec![
            format!("{}{} TEXT", tables::reference::BASE_URI, i),
            format!("{}{} TEXT", tables::reference::REFERENCE_RESOURCE_TYPE, i),
            format!("{}{} TEXT", tables::reference::REFERENCE_RESOURCE_ID, i),
        ]
    }

    let join = |parts: Vec<Vec<String>>| -> Vec<String> { parts.into_iter().flatten().collect() };

    match table {
        t if t == tables::TOKEN.name => token(""),
        t if t == tables::STRING.name => string(""),
        t if t == tables::DATE_TIME.name => date_time(""),
        t if t == tables::NUMBER.name => number(""),
        t if t == tables::QUANTITY.name => quantity(""),
        t if t == tables::URI.name => vec![format!("{} TEXT", tables::uri::URI)],
        t if t == tables::REFERENCE.name => reference(""),
        t if t == tables::COMPARTMENT.name => vec![
            format!("{} TEXT NOT NULL", tables::compartment::COMPARTMENT_TYPE),
            format!("{} TEXT NOT NULL", tables::compartment::REFERENCE_RESOURCE_ID),
        ],
        t if t == tables::TOKEN_TOKEN.name => join(vec![token("1"), token("2")]),
        t if t == tables::TOKEN_DATE_TIME.name => join(vec![token("1"), date_time("2")]),
        t if t == tables::TOKEN_QUANTITY.name => join(vec![token("1"), quantity("2")]),
        t if t == tables::TOKEN_STRING.name => join(vec![token("1"), string("2")]),
        t if t == tables::TOKEN_NUMBER_NUMBER.name => {
            join(vec![token("1"), number("2"), number("3")])
        }
        t if t == tables::REFERENCE_TOKEN.name => join(vec![reference("1"), token("2")]),
        _ => Vec::new(),
    }
}

fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(BackendError::MigrationError {
                    message: format!("no migration from schema version {}", version),
                }
                .into());
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        info!(version, "Migrated SQLite schema");
    }

    Ok(())
}

fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS stored_procedure (
            full_name TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            body TEXT NOT NULL,
            installed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS distributed_lock (
            lock_id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            acquired_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_date_time_longer_than_a_day
            ON date_time_search_param(search_param_uri, start_date_time)
            WHERE is_longer_than_a_day = 1;
        ",
    )
    .map_err(|e| BackendError::MigrationError {
        message: format!("v1 to v2: {}", e),
    })?;
    Ok(())
}

fn internal(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .is_ok()
    }

    #[test]
    fn test_fresh_schema_has_every_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(initialize_schema(&conn).unwrap(), SCHEMA_VERSION);

        for table in INDEX_TABLES {
            assert!(table_exists(&conn, table.name), "{} missing", table.name);
        }
        for name in [
            "resource",
            "system",
            "search_parameter_status",
            "stored_procedure",
            "distributed_lock",
        ] {
            assert!(table_exists(&conn, name), "{} missing", name);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_from_v1() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        create_schema_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        assert!(!table_exists(&conn, "distributed_lock"));

        initialize_schema(&conn).unwrap();
        assert!(table_exists(&conn, "distributed_lock"));
        assert_eq!(get_schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(
            initialize_schema(&conn),
            Err(StorageError::Backend(BackendError::SchemaMismatch { .. }))
        ));
    }

    #[test]
    fn test_composite_columns_are_suffixed() {
        let columns = index_columns(tables::TOKEN_QUANTITY.name);
        assert!(columns.iter().any(|c| c.starts_with("code1 ")));
        assert!(columns.iter().any(|c| c.starts_with("single_value2 ")));
    }
}
