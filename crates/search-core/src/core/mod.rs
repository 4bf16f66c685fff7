//! Collaborator traits of the search core.
//!
//! The registry, executor and deployer are written against these traits;
//! [`crate::backends::sqlite`] provides one implementation of each.
//!
//! - [`SearchParameterStatusDataStore`] - Persisted parameter statuses
//! - [`QueryDriver`] - Runs one page of a compiled query
//! - [`DistributedLock`] - Lease-based cross-instance lock
//! - [`ProcedureStore`] - Catalog of deployed stored procedures

mod lock;
mod procedure_store;
mod query_driver;
mod status_store;

pub use lock::{DistributedLock, LockAcquisition};
pub use procedure_store::{ProcedureInfo, ProcedureStore};
pub use query_driver::{FeedResponse, QueryDriver};
pub use status_store::SearchParameterStatusDataStore;
