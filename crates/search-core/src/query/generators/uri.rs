//! URI parameter query generator.

use crate::error::StorageResult;
use crate::expression::{FieldName, MissingFieldExpression, StringExpression};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, unsupported, visit_simple_missing,
    visit_simple_string,
};

/// Generates predicates against `uri_search_param`.
#[derive(Debug, Default)]
pub struct UriQueryGenerator;

impl SearchParameterQueryGenerator for UriQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Uri
    }

    fn table(&self) -> Table {
        tables::URI
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.field != FieldName::Uri {
            return Err(unsupported(self.category(), "String", expression.field));
        }
        visit_simple_string(
            ctx,
            tables::uri::URI,
            expression.component_index,
            expression.operator,
            &expression.value,
        );
        Ok(())
    }

    fn visit_missing_field(
        &self,
        expression: &MissingFieldExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.field != FieldName::Uri {
            return Err(unsupported(self.category(), "MissingField", expression.field));
        }
        visit_simple_missing(ctx, tables::uri::URI, expression.component_index);
        Ok(())
    }
}
