//! Search parameter catalog and status synchronization.
//!
//! This module decides which search parameters may appear in generated
//! queries:
//!
//! - [`SearchParameterLoader`] - Reads definitions (embedded, JSON, files)
//! - [`SearchParameterCatalog`] - In-memory, snapshot-swapped definitions
//! - [`SearchParameterStatusManager`] - Reconciles persisted statuses with the catalog
//! - [`InitializationGate`] - Runs reconciliation before the first search
//! - [`BroadcastChangePublisher`] - Announces flag changes
//!
//! # Status Lifecycle
//!
//! ```text
//! definition loaded ──▶ Supported ──▶ Enabled
//!                           │            │
//!                           └─▶ Disabled ◀┘
//! ```
//!
//! A parameter is searchable only while `Enabled`. A `Disabled` parameter
//! is re-checked against the support resolver on every reconciliation.

mod catalog;
pub mod errors;
mod initializer;
mod loader;
mod notification;
mod status;
mod status_manager;
mod support;

pub use catalog::{CatalogSnapshot, SearchParameterCatalog};
pub use errors::{LoaderError, RegistryError};
pub use initializer::InitializationGate;
pub use loader::SearchParameterLoader;
pub use notification::{
    BroadcastChangePublisher, SearchParameterChangePublisher, SearchParametersUpdated,
};
pub use status::{ResourceSearchParameterStatus, SearchParameterStatus};
pub use status_manager::SearchParameterStatusManager;
pub use support::{QueryGeneratorSupportResolver, SearchParameterSupportResolver};
