//! Versioned stored procedures and their deployment.
//!
//! A [`StoredProcedure`] is addressed by `name_hash`, where `hash` is the
//! SHA-256 of its body. [`UpgradeManager`] installs missing versions under
//! a distributed lock so concurrently starting instances do not race.

pub mod builtin;
mod procedure;
mod upgrade;

pub use builtin::{HARD_DELETE, PURGE_HISTORY, builtin_procedures};
pub use procedure::{StoredProcedure, content_hash};
pub use upgrade::{SchemaMigrator, UPGRADE_LOCK_ID, UpgradeManager, UpgradeOutcome};
