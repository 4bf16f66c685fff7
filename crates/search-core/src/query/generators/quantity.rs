//! Quantity parameter query generator.

use crate::error::StorageResult;
use crate::expression::{
    BinaryExpression, FieldName, MissingFieldExpression, StringExpression, StringOperator,
};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, numeric_param, unsupported,
    visit_simple_binary, visit_simple_missing, visit_simple_string, visit_system,
};

/// Generates predicates against `quantity_search_param`.
#[derive(Debug, Default)]
pub struct QuantityQueryGenerator;

impl SearchParameterQueryGenerator for QuantityQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Quantity
    }

    fn table(&self) -> Table {
        tables::QUANTITY
    }

    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = match expression.field {
            FieldName::Quantity => tables::quantity::SINGLE_VALUE,
            FieldName::QuantityLow => tables::quantity::LOW_VALUE,
            FieldName::QuantityHigh => tables::quantity::HIGH_VALUE,
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

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        if expression.operator != StringOperator::Equals {
            return Err(unsupported(self.category(), "String", expression.field));
        }

        match expression.field {
            FieldName::QuantitySystem => {
                visit_system(
                    ctx,
                    tables::quantity::SYSTEM_ID,
                    expression.component_index,
                    &expression.value,
                );
                Ok(())
            }
            FieldName::QuantityCode => {
                visit_simple_string(
                    ctx,
                    tables::quantity::QUANTITY_CODE,
                    expression.component_index,
                    expression.operator,
                    &expression.value,
                );
                Ok(())
            }
            field => Err(unsupported(self.category(), "String", field)),
        }
    }

    fn visit_missing_field(
        &self,
        expression: &MissingFieldExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = match expression.field {
            FieldName::QuantitySystem => tables::quantity::SYSTEM_ID,
            FieldName::QuantityCode => tables::quantity::QUANTITY_CODE,
            field => return Err(unsupported(self.category(), "MissingField", field)),
        };
        visit_simple_missing(ctx, column, expression.component_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::expression::{BinaryOperator, Expression};
    use crate::query::system_cache::SystemIdCache;

    #[test]
    fn test_quantity_value_and_code() {
        let cache = SystemIdCache::new();
        cache.insert("http://unitsofmeasure.org", 4);
        let mut ctx = QueryGeneratorContext::new("Observation", "qt1", &cache);

        let value = BinaryExpression {
            operator: BinaryOperator::GreaterThan,
            field: FieldName::Quantity,
            component_index: None,
            value: Decimal::new(1205, 1).into(),
        };
        QuantityQueryGenerator.visit_binary(&value, &mut ctx).unwrap();
        ctx.push(" AND ");

        let Expression::String(system) =
            Expression::string_equals(FieldName::QuantitySystem, "http://unitsofmeasure.org")
        else {
            unreachable!()
        };
        QuantityQueryGenerator.visit_string(&system, &mut ctx).unwrap();
        ctx.push(" AND ");

        let Expression::String(code) = Expression::string_equals(FieldName::QuantityCode, "mm[Hg]")
        else {
            unreachable!()
        };
        QuantityQueryGenerator.visit_string(&code, &mut ctx).unwrap();

        assert_eq!(
            ctx.sql(),
            "qt1.single_value > ?1 AND qt1.system_id = ?2 AND qt1.quantity_code = ?3"
        );
    }

    #[test]
    fn test_rejects_prefix_match_on_code() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Observation", "qt1", &cache);
        let Expression::String(code) = Expression::starts_with(FieldName::QuantityCode, "mm")
        else {
            unreachable!()
        };
        assert!(QuantityQueryGenerator.visit_string(&code, &mut ctx).is_err());
    }
}
