//! Compartment membership query generator.

use crate::error::StorageResult;
use crate::expression::CompartmentExpression;
use crate::query::context::QueryGeneratorContext;
use crate::query::fragment::SqlParam;
use crate::query::tables::{self, Table};

use super::{QueryCategory, SearchParameterQueryGenerator};

/// Generates predicates against `compartment_assignment`.
#[derive(Debug, Default)]
pub struct CompartmentQueryGenerator;

impl SearchParameterQueryGenerator for CompartmentQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Compartment
    }

    fn table(&self) -> Table {
        tables::COMPARTMENT
    }

    fn visit_compartment(
        &self,
        expression: &CompartmentExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let type_column = ctx.column(tables::compartment::COMPARTMENT_TYPE, None);
        let id_column = ctx.column(tables::compartment::REFERENCE_RESOURCE_ID, None);

        ctx.push(&type_column);
        ctx.push(" = ");
        ctx.push_param(SqlParam::string(&expression.compartment_type));
        ctx.push(" AND ");
        ctx.push(&id_column);
        ctx.push(" = ");
        ctx.push_param(SqlParam::string(&expression.compartment_id));
        Ok(())
    }
}
