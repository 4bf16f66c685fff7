//! Composite parameter query generators.
//!
//! A composite generator owns one table whose columns are the component
//! columns suffixed with their 1-based position. Each field node carries a
//! component index; the node is handed to the generator of that
//! component's category, which emits suffixed column names.

use std::fmt;
use std::sync::Arc;

use crate::error::{ExpressionError, StorageResult};
use crate::expression::{BinaryExpression, MissingFieldExpression, StringExpression};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    DateTimeQueryGenerator, NumberQueryGenerator, QuantityQueryGenerator, QueryCategory,
    ReferenceQueryGenerator, SearchParameterQueryGenerator, StringQueryGenerator,
    TokenQueryGenerator,
};

/// Generator for one composite category.
pub struct CompositeQueryGenerator {
    category: QueryCategory,
    table: Table,
    components: Vec<Arc<dyn SearchParameterQueryGenerator>>,
}

impl fmt::Debug for CompositeQueryGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeQueryGenerator")
            .field("category", &self.category)
            .field("table", &self.table.name)
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .map(|c| c.category())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CompositeQueryGenerator {
    /// Builds the generator for a composite category.
    ///
    /// Returns `None` for categories that are not composite.
    pub fn for_category(category: QueryCategory) -> Option<Self> {
        let token = || Arc::new(TokenQueryGenerator) as Arc<dyn SearchParameterQueryGenerator>;

        let (table, components): (Table, Vec<Arc<dyn SearchParameterQueryGenerator>>) =
            match category {
                QueryCategory::TokenToken => (tables::TOKEN_TOKEN, vec![token(), token()]),
                QueryCategory::TokenDateTime => (
                    tables::TOKEN_DATE_TIME,
                    vec![token(), Arc::new(DateTimeQueryGenerator)],
                ),
                QueryCategory::TokenQuantity => (
                    tables::TOKEN_QUANTITY,
                    vec![token(), Arc::new(QuantityQueryGenerator)],
                ),
                QueryCategory::TokenString => (
                    tables::TOKEN_STRING,
                    vec![token(), Arc::new(StringQueryGenerator)],
                ),
                QueryCategory::TokenNumberNumber => (
                    tables::TOKEN_NUMBER_NUMBER,
                    vec![
                        token(),
                        Arc::new(NumberQueryGenerator),
                        Arc::new(NumberQueryGenerator),
                    ],
                ),
                QueryCategory::ReferenceToken => (
                    tables::REFERENCE_TOKEN,
                    vec![Arc::new(ReferenceQueryGenerator), token()],
                ),
                _ => return None,
            };

        Some(Self {
            category,
            table,
            components,
        })
    }

    /// Number of components.
    pub fn arity(&self) -> usize {
        self.components.len()
    }

    fn component(
        &self,
        component_index: Option<usize>,
    ) -> StorageResult<&Arc<dyn SearchParameterQueryGenerator>> {
        let index = component_index.ok_or_else(|| ExpressionError::MissingComponentIndex {
            category: self.category.to_string(),
        })?;
        self.components.get(index).ok_or_else(|| {
            ExpressionError::InvalidComponentIndex {
                category: self.category.to_string(),
                index,
            }
            .into()
        })
    }
}

impl SearchParameterQueryGenerator for CompositeQueryGenerator {
    fn category(&self) -> QueryCategory {
        self.category
    }

    fn table(&self) -> Table {
        self.table
    }

    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        self.component(expression.component_index)?
            .visit_binary(expression, ctx)
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        self.component(expression.component_index)?
            .visit_string(expression, ctx)
    }

    fn visit_missing_field(
        &self,
        expression: &MissingFieldExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        self.component(expression.component_index)?
            .visit_missing_field(expression, ctx)
    }
}
