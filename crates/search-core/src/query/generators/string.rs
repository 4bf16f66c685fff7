//! String parameter query generator.

use crate::error::StorageResult;
use crate::expression::{FieldName, MissingFieldExpression, StringExpression};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, unsupported, visit_simple_missing,
    visit_simple_string,
};

/// Generates predicates against `string_search_param`.
///
/// Case-insensitive matches run against `text_normalized`, which holds the
/// lower-cased value.
#[derive(Debug, Default)]
pub struct StringQueryGenerator;

impl SearchParameterQueryGenerator for StringQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::String
    }

    fn table(&self) -> Table {
        tables::STRING
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.field != FieldName::String {
            return Err(unsupported(self.category(), "String", expression.field));
        }

        if expression.ignore_case {
            visit_simple_string(
                ctx,
                tables::string::TEXT_NORMALIZED,
                expression.component_index,
                expression.operator,
                &expression.value.to_lowercase(),
            );
        } else {
            visit_simple_string(
                ctx,
                tables::string::TEXT,
                expression.component_index,
                expression.operator,
                &expression.value,
            );
        }
        Ok(())
    }

    fn visit_missing_field(
        &self,
        expression: &MissingFieldExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.field != FieldName::String {
            return Err(unsupported(self.category(), "MissingField", expression.field));
        }
        visit_simple_missing(ctx, tables::string::TEXT, expression.component_index);
        Ok(())
    }
}
