//! Mutable state of a single compilation pass.

use super::fragment::{SqlFragment, SqlParam};
use super::system_cache::SystemIdCache;

/// Accumulates SQL text and bound parameters while an expression tree is
/// compiled.
///
/// Generators append predicates for the table currently aliased by
/// [`table_alias`](Self::table_alias). The compiler switches aliases when it
/// descends into a sub-query.
#[derive(Debug)]
pub struct QueryGeneratorContext<'a> {
    fragment: SqlFragment,
    table_alias: String,
    resource_type: String,
    system_cache: &'a SystemIdCache,
    alias_counter: usize,
}

impl<'a> QueryGeneratorContext<'a> {
    /// Creates a context for a query over `resource_type`.
    pub fn new(
        resource_type: impl Into<String>,
        table_alias: impl Into<String>,
        system_cache: &'a SystemIdCache,
    ) -> Self {
        Self {
            fragment: SqlFragment::default(),
            table_alias: table_alias.into(),
            resource_type: resource_type.into(),
            system_cache,
            alias_counter: 0,
        }
    }

    /// Appends raw SQL text.
    pub fn push(&mut self, sql: &str) {
        self.fragment.push_str(sql);
    }

    /// Binds a parameter and returns its placeholder.
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.fragment.add_param(param)
    }

    /// Binds a parameter and appends its placeholder.
    pub fn push_param(&mut self, param: SqlParam) {
        let placeholder = self.bind(param);
        self.push(&placeholder);
    }

    /// The alias of the table predicates are generated against.
    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }

    /// The resource type being searched.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The system-id cache consulted for token systems.
    pub fn system_cache(&self) -> &SystemIdCache {
        self.system_cache
    }

    /// Qualified column reference, with a component suffix when given.
    pub fn column(&self, name: &str, component_index: Option<usize>) -> String {
        match component_index {
            Some(index) => format!("{}.{}{}", self.table_alias, name, index + 1),
            None => format!("{}.{}", self.table_alias, name),
        }
    }

    /// Allocates a fresh alias using `prefix`.
    pub fn next_alias(&mut self, prefix: &str) -> String {
        self.alias_counter += 1;
        format!("{}{}", prefix, self.alias_counter)
    }

    /// Runs `f` with `alias` as the current table alias, restoring the
    /// previous alias afterwards.
    pub fn with_alias<T>(&mut self, alias: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.table_alias, alias.to_string());
        let result = f(self);
        self.table_alias = previous;
        result
    }

    /// Returns the accumulated fragment.
    pub fn into_fragment(self) -> SqlFragment {
        self.fragment
    }

    /// Returns the SQL text accumulated so far.
    pub fn sql(&self) -> &str {
        &self.fragment.sql
    }
}
