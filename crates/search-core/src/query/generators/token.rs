//! Token parameter query generator.

use crate::error::StorageResult;
use crate::expression::{FieldName, MissingFieldExpression, StringExpression, StringOperator};
use crate::query::context::QueryGeneratorContext;
use crate::query::tables::{self, Table};

use super::{
    QueryCategory, SearchParameterQueryGenerator, unsupported, visit_simple_missing,
    visit_simple_string, visit_system,
};

/// Generates predicates against `token_search_param`.
///
/// Token systems are stored as ids into the `system` table; codes are
/// stored verbatim.
#[derive(Debug, Default)]
pub struct TokenQueryGenerator;

impl SearchParameterQueryGenerator for TokenQueryGenerator {
    fn category(&self) -> QueryCategory {
        QueryCategory::Token
    }

    fn table(&self) -> Table {
        tables::TOKEN
    }

    fn visit_string(
        &self,
        expression: &StringExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        match expression.field {
            FieldName::TokenSystem if expression.operator == StringOperator::Equals => {
                visit_system(
                    ctx,
                    tables::token::SYSTEM_ID,
                    expression.component_index,
                    &expression.value,
                );
                Ok(())
            }
            FieldName::TokenCode => {
                visit_simple_string(
                    ctx,
                    tables::token::CODE,
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
        match expression.field {
            FieldName::TokenSystem => {
                visit_simple_missing(ctx, tables::token::SYSTEM_ID, expression.component_index);
                Ok(())
            }
            field => Err(unsupported(self.category(), "MissingField", field)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExpressionError, StorageError};
    use crate::expression::{BinaryExpression, BinaryOperator, Expression};
    use crate::query::system_cache::SystemIdCache;

    fn string_node(expr: Expression) -> StringExpression {
        match expr {
            Expression::String(s) => s,
            other => panic!("expected string node, got {:?}", other),
        }
    }

    #[test]
    fn test_token_code() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        let node = string_node(Expression::string_equals(FieldName::TokenCode, "8480-6"));
        TokenQueryGenerator.visit_string(&node, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "tk1.code = ?1");
    }

    #[test]
    fn test_token_system_cached_and_uncached() {
        let cache = SystemIdCache::new();
        let node = string_node(Expression::string_equals(
            FieldName::TokenSystem,
            "http://loinc.org",
        ));

        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        TokenQueryGenerator.visit_string(&node, &mut ctx).unwrap();
        assert!(ctx.sql().contains("IN (SELECT system_id FROM system"));

        cache.insert("http://loinc.org", 3);
        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        TokenQueryGenerator.visit_string(&node, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "tk1.system_id = ?1");
    }

    #[test]
    fn test_token_missing_system() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        let node = MissingFieldExpression {
            field: FieldName::TokenSystem,
            component_index: None,
        };
        TokenQueryGenerator.visit_missing_field(&node, &mut ctx).unwrap();
        assert_eq!(ctx.sql(), "tk1.system_id IS NULL");
    }

    #[test]
    fn test_token_rejects_binary_and_foreign_fields() {
        let cache = SystemIdCache::new();
        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);

        let binary = BinaryExpression {
            operator: BinaryOperator::Equal,
            field: FieldName::TokenCode,
            component_index: None,
            value: "x".into(),
        };
        assert!(matches!(
            TokenQueryGenerator.visit_binary(&binary, &mut ctx),
            Err(StorageError::Expression(ExpressionError::UnsupportedExpression { .. }))
        ));

        let node = string_node(Expression::string_equals(FieldName::Uri, "http://x"));
        assert!(TokenQueryGenerator.visit_string(&node, &mut ctx).is_err());

        let node = string_node(Expression::starts_with(FieldName::TokenSystem, "http://"));
        assert!(TokenQueryGenerator.visit_string(&node, &mut ctx).is_err());
    }
}
