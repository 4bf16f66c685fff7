//! Generator for parameters stored directly on the resource table.
//!
//! `_id`, `_type` and `_lastUpdated` are columns of `resource` itself, so
//! predicates are emitted against the outer resource alias rather than a
//! correlated sub-query.

use crate::error::StorageResult;
use crate::expression::{BinaryExpression, FieldName, StringExpression};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, instant_param, unsupported, visit_simple_binary,
    visit_simple_string,
};

/// Generates predicates against `resource`.
#[derive(Debug, Default)]
pub struct ResourceTableQueryGenerator;

impl SearchParameterQueryGenerator for ResourceTableQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::ResourceTable
    }

    fn table(&self) -> Table {
        tables::RESOURCE
    }

    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.field != FieldName::LastUpdated {
            return Err(unsupported(self.category(), "Binary", expression.field));
        }
        let param = instant_param(expression.field, &expression.value)?;
        visit_simple_binary(
            ctx,
            tables::resource::LAST_UPDATED,
            None,
            expression.operator,
            param,
        );
        Ok(())
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = match expression.field {
            FieldName::ResourceId => tables::resource::RESOURCE_ID,
            FieldName::ResourceType => tables::resource::RESOURCE_TYPE,
            field => return Err(unsupported(self.category(), "String", field)),
        };
        visit_simple_string(ctx, column, None, expression.operator, &expression.value);
        Ok(())
    }
}
