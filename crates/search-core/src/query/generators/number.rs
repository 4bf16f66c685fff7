//! Number parameter query generator.

use crate::error::StorageResult;
use crate::expression::{BinaryExpression, FieldName};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, numeric_param, unsupported, visit_simple_binary,
};

/// Generates predicates against `number_search_param`.
#[derive(Debug, Default)]
pub struct NumberQueryGenerator;

impl SearchParameterQueryGenerator for NumberQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Number
    }

    fn table(&self) -> Table {
        tables::NUMBER
    }

    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = match expression.field {
            FieldName::Number => tables::number::SINGLE_VALUE,
            FieldName::NumberLow => tables::number::LOW_VALUE,
            FieldName::NumberHigh => tables::number::HIGH_VALUE,
            field => return Err(unsupported(self.category(), "Binary", field)),
        };

        let param = numeric_param(expression.field, &expression.value)?;
        visit_simple_binary(
            ctx,
            column,
            expression.component_index,
            expression.operator,
            param,
        );
        Ok(())
    }
}
