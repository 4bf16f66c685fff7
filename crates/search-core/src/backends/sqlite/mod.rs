//! SQLite backend.
//!
//! Implements every collaborator trait of the search core on one SQLite
//! database: in-memory for tests, file-based when several processes need
//! to share state.
//!
//! # Example
//!
//! ```no_run
//! use helios_search_core::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("search.db")?;
//! let version = backend.init_schema()?;
//! println!("schema version {}", version);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! -- One row per resource version
//! CREATE TABLE resource (
//!     resource_surrogate_id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     resource_type TEXT NOT NULL,
//!     resource_id TEXT NOT NULL,
//!     version INTEGER NOT NULL,
//!     last_updated INTEGER NOT NULL,   -- epoch millis
//!     raw_resource TEXT NOT NULL,
//!     is_history INTEGER NOT NULL DEFAULT 0,
//!     is_deleted INTEGER NOT NULL DEFAULT 0
//! );
//!
//! -- Normalized system URIs referenced by token and quantity rows
//! CREATE TABLE system (system_id INTEGER PRIMARY KEY, value TEXT UNIQUE);
//!
//! -- One table per parameter category, keyed by
//! -- (resource_surrogate_id, search_param_uri)
//! CREATE TABLE token_search_param (..., system_id INTEGER, code TEXT);
//!
//! CREATE TABLE search_parameter_status (uri TEXT PRIMARY KEY, status TEXT, ...);
//! CREATE TABLE stored_procedure (full_name TEXT PRIMARY KEY, body TEXT, ...);
//! CREATE TABLE distributed_lock (lock_id TEXT PRIMARY KEY, owner_id TEXT, expires_at INTEGER, ...);
//! ```

mod backend;
mod lock;
mod procedures;
mod processor;
mod query_driver;
pub mod schema;
mod status_store;
mod writer;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use lock::SqliteDistributedLock;
pub use processor::SqliteResponseProcessor;
pub use query_driver::{SqliteQueryDriver, SqliteQueryError};
pub use writer::{IndexEntry, IndexValue, ResourceWrite};
