//! Query generation.
//!
//! - [`generators`] - One [`SearchParameterQueryGenerator`] per parameter category
//! - [`QueryGeneratorRegistry`] - Resolves parameters to their generator
//! - [`SqlQueryCompiler`] - Compiles whole expression trees into [`CompiledQuery`]
//! - [`SystemIdCache`] - Partial cache of code system ids used by token predicates

mod compiler;
mod context;
mod fragment;
pub mod generators;
mod registry;
mod system_cache;
pub mod tables;

pub use compiler::{CompiledQuery, SqlQueryCompiler};
pub use context::QueryGeneratorContext;
pub use fragment::{SqlFragment, SqlParam};
pub use generators::{QueryCategory, SearchParameterQueryGenerator, to_millis};
pub use registry::QueryGeneratorRegistry;
pub use system_cache::SystemIdCache;
