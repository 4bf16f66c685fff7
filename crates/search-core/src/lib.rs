//! Helios FHIR Server Search Core
//!
//! This crate decides which search parameters a data store currently
//! supports, compiles backend-independent search expressions into SQL, pages
//! through the results with opaque continuation tokens, and deploys
//! versioned stored procedures under a distributed lock.
//!
//! # Architecture
//!
//! - [`types`] - Search parameter records, pages and continuation tokens
//! - [`expression`] - Backend-independent expression trees
//! - [`query`] - Query generators (one per parameter category) and the SQL compiler
//! - [`search`] - Parameter catalog, loader and status synchronization
//! - [`core`] - Collaborator traits (status store, query driver, lock, procedure store)
//! - [`execution`] - Paginated query execution with telemetry
//! - [`procedures`] - Content-addressed procedures and the upgrade manager
//! - [`backends`] - Backend implementations (SQLite)
//! - [`config`] - Configuration
//! - [`error`] - Error types for all operations
//!
//! # Features
//!
//! - `sqlite` (default) - SQLite backend via `rusqlite` and `r2d2`
//! - `cli` - The `search-sync` maintenance binary
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helios_search_core::backends::sqlite::{
//!     SqliteBackend, SqliteQueryDriver, SqliteResponseProcessor,
//! };
//! use helios_search_core::execution::{DocumentQuery, TracingQueryLogger};
//! use helios_search_core::expression::{Expression, FieldName};
//! use helios_search_core::query::{QueryGeneratorRegistry, SqlQueryCompiler};
//! use helios_search_core::search::{
//!     BroadcastChangePublisher, QueryGeneratorSupportResolver, SearchParameterCatalog,
//!     SearchParameterLoader, SearchParameterStatus, SearchParameterStatusManager,
//! };
//! use helios_search_core::types::PageRequest;
//!
//! # async fn run() -> helios_search_core::StorageResult<()> {
//! let backend = SqliteBackend::open("search.db")?;
//! backend.init_schema()?;
//!
//! // Reconcile parameter statuses with the store
//! let registry = Arc::new(QueryGeneratorRegistry::new());
//! let catalog = Arc::new(SearchParameterCatalog::new(
//!     SearchParameterLoader::new().load_embedded(),
//! )?);
//! let manager = SearchParameterStatusManager::new(
//!     Arc::new(backend.clone()),
//!     catalog.clone(),
//!     Arc::new(QueryGeneratorSupportResolver::new(registry.clone())),
//!     Arc::new(BroadcastChangePublisher::default()),
//! );
//! manager.ensure_initialized().await?;
//!
//! let name_url = "http://hl7.org/fhir/SearchParameter/Patient-name";
//! manager
//!     .set_status(&[name_url.to_string()], SearchParameterStatus::Enabled)
//!     .await?;
//!
//! // name:starts-with=smi
//! let name = catalog.get(name_url).expect("embedded parameter");
//! let expr = Expression::search_parameter(
//!     name,
//!     Expression::starts_with(FieldName::String, "smi"),
//! );
//! let compiler = SqlQueryCompiler::new(registry, backend.system_cache().clone());
//! let query = compiler.compile("Patient", Some(&expr))?;
//!
//! // Page through the results
//! let mut pages = DocumentQuery::new(
//!     Arc::new(SqliteQueryDriver::new(&backend)),
//!     Arc::new(SqliteResponseProcessor::default()),
//!     Arc::new(TracingQueryLogger),
//!     query,
//!     PageRequest::first(50),
//! );
//! while pages.has_more_results() {
//!     let page = pages.execute_next().await?;
//!     println!("{} results", page.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod execution;
pub mod expression;
pub mod procedures;
pub mod query;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ErrorClass, StorageError, StorageResult};
pub use expression::Expression;
pub use types::{ContinuationToken, Page, PageRequest, SearchParameterInfo};

// Re-export core traits
pub use core::{DistributedLock, ProcedureStore, QueryDriver, SearchParameterStatusDataStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
