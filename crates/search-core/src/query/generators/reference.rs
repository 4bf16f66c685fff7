//! Reference parameter query generator.

use crate::error::StorageResult;
use crate::expression::{FieldName, MissingFieldExpression, StringExpression};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, unsupported, visit_simple_missing,
    visit_simple_string,
};

/// Generates predicates against `reference_search_param`.
#[derive(Debug, Default)]
pub struct ReferenceQueryGenerator;

impl ReferenceQueryGenerator {
    fn column(&self, field: FieldName, node: &str) -> StorageResult<&'static str> {
        match field {
            FieldName::ReferenceBaseUri => Ok(tables::reference::BASE_URI),
            FieldName::ReferenceResourceType => Ok(tables::reference::REFERENCE_RESOURCE_TYPE),
            FieldName::ReferenceResourceId => Ok(tables::reference::REFERENCE_RESOURCE_ID),
            field => Err(unsupported(self.category(), node, field)),
        }
    }
}

impl SearchParameterQueryGenerator for ReferenceQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Reference
    }

    fn table(&self) -> Table {
        tables::REFERENCE
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = self.column(expression.field, "String")?;
        visit_simple_string(
            ctx,
            column,
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
        if expression.field == FieldName::ReferenceResourceId {
            return Err(unsupported(self.category(), "MissingField", expression.field));
        }
        let column = self.column(expression.field, "MissingField")?;
        visit_simple_missing(ctx, column, expression.component_index);
        Ok(())
    }
}
