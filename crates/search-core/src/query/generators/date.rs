//! Date/time parameter query generator.

use crate::error::{ExpressionError, StorageResult};
use crate::expression::{BinaryExpression, BinaryOperator, ExpressionValue, FieldName};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, instant_param, unsupported, visit_simple_binary,
};

/// Generates predicates against `date_time_search_param`.
///
/// Every date value is stored as a `[start, end]` range in epoch
/// milliseconds plus a precomputed `is_longer_than_a_day` flag.
#[derive(Debug, Default)]
pub struct DateTimeQueryGenerator;

impl SearchParameterQueryGenerator for DateTimeQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::DateTime
    }

    fn table(&self) -> Table {
        tables::DATE_TIME
    }

    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let column = match expression.field {
            FieldName::DateTimeStart => tables::date_time::START_DATE_TIME,
            FieldName::DateTimeEnd => tables::date_time::END_DATE_TIME,
            FieldName::DateTimeIsLongerThanADay => {
                return self.visit_longer_than_a_day(expression, ctx);
            }
            field => return Err(unsupported(self.category(), "Binary", field)),
        };

        let param = instant_param(expression.field, &expression.value)?;
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

impl DateTimeQueryGenerator {
    // Emitted as a literal: the partial index on this flag is only chosen
    // when the predicate is a constant.
    fn visit_longer_than_a_day(
        &self,
        expression: &BinaryExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let ExpressionValue::Boolean(flag) = expression.value else {
            return Err(ExpressionError::InvalidValue {
                field: expression.field.to_string(),
                value: expression.value.to_string(),
            }
            .into());
        };

        let comparator = match expression.operator {
            BinaryOperator::Equal => " = ",
            BinaryOperator::NotEqual => " <> ",
            _ => return Err(unsupported(self.category(), "Binary", expression.field)),
        };

        let column = ctx.column(
            tables::date_time::IS_LONGER_THAN_A_DAY,
            expression.component_index,
        );
        ctx.push(&column);
        ctx.push(comparator);
        ctx.push(if flag { "1" } else { "0" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::expression::MissingFieldExpression;
    use crate::query::system_cache::SystemIdCache;

    fn binary(operator: BinaryOperator, field: FieldName, value: ExpressionValue) -> BinaryExpression {
        BinaryExpression {
            operator,
            field,
            component_index: None,
            value,
        }
    }

    #[test]
    fn test_start_bound_is_parameterized() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Patient", "dt1", &cache);
        let instant = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let expr = binary(
            BinaryOperator::GreaterThanOrEqual,
            FieldName::DateTimeStart,
            instant.into(),
        );
        DateTimeQueryGenerator.visit_binary(&expr, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "dt1.start_date_time >= ?1");
        assert_eq!(
            ctx.into_fragment().params,
            vec![crate::query::SqlParam::Integer(instant.timestamp_millis())]
        );
    }

    #[test]
    fn test_longer_than_a_day_is_literal() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Encounter", "dt1", &cache);
        let expr = binary(
            BinaryOperator::Equal,
            FieldName::DateTimeIsLongerThanADay,
            true.into(),
        );
        DateTimeQueryGenerator.visit_binary(&expr, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "dt1.is_longer_than_a_day = 1");
        assert!(ctx.into_fragment().params.is_empty());
    }

    #[test]
    fn test_longer_than_a_day_composite_suffix() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Observation", "ctd1", &cache);
        let mut expr = binary(
            BinaryOperator::Equal,
            FieldName::DateTimeIsLongerThanADay,
            false.into(),
        );
        expr.component_index = Some(1);
        DateTimeQueryGenerator.visit_binary(&expr, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "ctd1.is_longer_than_a_day2 = 0");
    }

    #[test]
    fn test_rejects_other_fields() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Patient", "dt1", &cache);
        let expr = binary(BinaryOperator::Equal, FieldName::Number, 1i64.into());
        assert!(DateTimeQueryGenerator.visit_binary(&expr, &mut ctx).is_err());

        let missing = MissingFieldExpression {
            field: FieldName::DateTimeStart,
            component_index: None,
        };
        assert!(DateTimeQueryGenerator
            .visit_missing_field(&missing, &mut ctx)
            .is_err());
    }
}
