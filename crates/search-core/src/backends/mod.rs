//! Backend implementations of the collaborator traits.

#[cfg(feature = "sqlite")]
pub mod sqlite;
