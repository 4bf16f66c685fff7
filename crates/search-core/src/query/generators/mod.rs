//! Per-category query generators.
//!
//! Each search parameter category has exactly one generator. A generator
//! knows the columns of its table and translates the field nodes of an
//! expression into SQL predicates against that table. Anything it cannot
//! translate is rejected with [`ExpressionError::UnsupportedExpression`].

mod composite;
mod compartment;
mod date;
mod number;
mod quantity;
mod reference;
mod resource;
mod string;
mod token;
mod uri;

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

pub use composite::CompositeQueryGenerator;
pub use compartment::CompartmentQueryGenerator;
pub use date::DateTimeQueryGenerator;
pub use number::NumberQueryGenerator;
pub use quantity::QuantityQueryGenerator;
pub use reference::ReferenceQueryGenerator;
pub use resource::ResourceTableQueryGenerator;
pub use string::StringQueryGenerator;
pub use token::TokenQueryGenerator;
pub use uri::UriQueryGenerator;

use crate::error::{ExpressionError, StorageError, StorageResult};
use crate::expression::{
    BinaryExpression, BinaryOperator, CompartmentExpression, ExpressionValue, FieldName,
    MissingFieldExpression, StringExpression, StringOperator,
};

use super::context::QueryGeneratorContext;
use super::fragment::SqlParam;
use super::tables::{self, Table};

/// The categories of search parameters that have a query generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryCategory {
    ResourceTable,
    Token,
    String,
    DateTime,
    Number,
    Quantity,
    Uri,
    Reference,
    Compartment,
    TokenToken,
    TokenDateTime,
    TokenQuantity,
    TokenString,
    TokenNumberNumber,
    ReferenceToken,
}

impl QueryCategory {
    /// Every declared category.
    pub const ALL: [QueryCategory; 15] = [
        QueryCategory::ResourceTable,
        QueryCategory::Token,
        QueryCategory::String,
        QueryCategory::DateTime,
        QueryCategory::Number,
        QueryCategory::Quantity,
        QueryCategory::Uri,
        QueryCategory::Reference,
        QueryCategory::Compartment,
        QueryCategory::TokenToken,
        QueryCategory::TokenDateTime,
        QueryCategory::TokenQuantity,
        QueryCategory::TokenString,
        QueryCategory::TokenNumberNumber,
        QueryCategory::ReferenceToken,
    ];

    /// Returns true for the composite categories.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            QueryCategory::TokenToken
                | QueryCategory::TokenDateTime
                | QueryCategory::TokenQuantity
                | QueryCategory::TokenString
                | QueryCategory::TokenNumberNumber
                | QueryCategory::ReferenceToken
        )
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Translates expression nodes of one parameter category into SQL.
///
/// Every visit method defaults to rejecting the node; implementations
/// override only what their table can answer.
pub trait SearchParameterQueryGenerator: Send + Sync + fmt::Debug {
    /// The category served by this generator.
    fn category(&self) -> QueryCategory;

    /// The table this generator emits predicates against.
    fn table(&self) -> Table;

    /// Appends a predicate for a binary comparison.
    fn visit_binary(
        &self,
        expression: &BinaryExpression,
        _ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        Err(unsupported(self.category(), "Binary", expression.field))
    }

    /// Appends a predicate for a string match.
    fn visit_string(
        &self,
        expression: &StringExpression,
        _ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        Err(unsupported(self.category(), "String", expression.field))
    }

    /// Appends a predicate matching rows without a value for the field.
    fn visit_missing_field(
        &self,
        expression: &MissingFieldExpression,
        _ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        Err(unsupported(self.category(), "MissingField", expression.field))
    }

    /// Appends a compartment membership predicate.
    fn visit_compartment(
        &self,
        _expression: &CompartmentExpression,
        _ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        Err(StorageError::Expression(ExpressionError::UnsupportedExpression {
            category: self.category().to_string(),
            node: "Compartment".to_string(),
            field: "-".to_string(),
        }))
    }
}

/// Builds the structural error for a node a generator cannot translate.
pub(crate) fn unsupported(category: QueryCategory, node: &str, field: FieldName) -> StorageError {
    StorageError::Expression(ExpressionError::UnsupportedExpression {
        category: category.to_string(),
        node: node.to_string(),
        field: field.to_string(),
    })
}

/// `alias.column op ?N`
pub(crate) fn visit_simple_binary(
    ctx: &mut QueryGeneratorContext<'_>,
    column: &str,
    component_index: Option<usize>,
    operator: BinaryOperator,
    param: SqlParam,
) {
    let column = ctx.column(column, component_index);
    ctx.push(&column);
    ctx.push(" ");
    ctx.push(operator.as_sql());
    ctx.push(" ");
    ctx.push_param(param);
}

/// Emits a string match on `column` using the operator of `expression`.
///
/// Matching is case-sensitive on the column as stored; callers pass a
/// normalized column and lower-cased value for case-insensitive searches.
pub(crate) fn visit_simple_string(
    ctx: &mut QueryGeneratorContext<'_>,
    column: &str,
    component_index: Option<usize>,
    operator: StringOperator,
    value: &str,
) {
    let column = ctx.column(column, component_index);
    let p = ctx.bind(SqlParam::string(value));
    let predicate = match operator {
        StringOperator::Equals => format!("{} = {}", column, p),
        StringOperator::StartsWith | StringOperator::NotStartsWith => {
            format!("instr({}, {}) = 1", column, p)
        }
        StringOperator::EndsWith | StringOperator::NotEndsWith => {
            format!("substr({}, -length({})) = {}", column, p, p)
        }
        StringOperator::Contains | StringOperator::NotContains => {
            format!("instr({}, {}) > 0", column, p)
        }
    };

    if operator.is_negated() {
        ctx.push("NOT (");
        ctx.push(&predicate);
        ctx.push(")");
    } else {
        ctx.push(&predicate);
    }
}

/// `alias.column IS NULL`
pub(crate) fn visit_simple_missing(
    ctx: &mut QueryGeneratorContext<'_>,
    column: &str,
    component_index: Option<usize>,
) {
    let column = ctx.column(column, component_index);
    ctx.push(&column);
    ctx.push(" IS NULL");
}

/// Emits a system-id predicate, using the cache when the URI is known.
pub(crate) fn visit_system(
    ctx: &mut QueryGeneratorContext<'_>,
    column: &str,
    component_index: Option<usize>,
    system: &str,
) {
    let column = ctx.column(column, component_index);
    match ctx.system_cache().get(system) {
        Some(system_id) => {
            ctx.push(&column);
            ctx.push(" = ");
            ctx.push_param(SqlParam::integer(system_id));
        }
        None => {
            let p = ctx.bind(SqlParam::string(system));
            ctx.push(&format!(
                "{} IN (SELECT {} FROM {} WHERE {} = {})",
                column,
                tables::system::SYSTEM_ID,
                tables::system::TABLE,
                tables::system::VALUE,
                p
            ));
        }
    }
}

/// Converts a numeric literal into a REAL parameter.
pub(crate) fn numeric_param(
    field: FieldName,
    value: &ExpressionValue,
) -> StorageResult<SqlParam> {
    match value {
        ExpressionValue::Integer(i) => Ok(SqlParam::float(*i as f64)),
        ExpressionValue::Decimal(d) => d.to_f64().map(SqlParam::float).ok_or_else(|| {
            ExpressionError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into()
        }),
        other => Err(ExpressionError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

/// Converts a date literal into epoch milliseconds.
pub(crate) fn instant_param(
    field: FieldName,
    value: &ExpressionValue,
) -> StorageResult<SqlParam> {
    match value {
        ExpressionValue::DateTime(dt) => Ok(SqlParam::integer(to_millis(dt))),
        other => Err(ExpressionError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

/// Epoch milliseconds, the storage format of every instant column.
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::system_cache::SystemIdCache;

    #[test]
    fn test_simple_string_operators() {
        let cache = SystemIdCache::new();
        let cases = [
            (StringOperator::Equals, "st1.text = ?1"),
            (StringOperator::StartsWith, "instr(st1.text, ?1) = 1"),
            (StringOperator::EndsWith, "substr(st1.text, -length(?1)) = ?1"),
            (StringOperator::Contains, "instr(st1.text, ?1) > 0"),
            (StringOperator::NotContains, "NOT (instr(st1.text, ?1) > 0)"),
        ];
        for (operator, expected) in cases {
            let mut ctx = QueryGeneratorContext::new("Patient", "st1", &cache);
            visit_simple_string(&mut ctx, "text", None, operator, "smi");
            assert_eq!(ctx.sql(), expected, "operator {:?}", operator);
        }
    }

    #[test]
    fn test_system_uses_cache_when_present() {
        let cache = SystemIdCache::new();
        cache.insert("http://loinc.org", 12);

        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        visit_system(&mut ctx, "system_id", None, "http://loinc.org");
        assert_eq!(ctx.sql(), "tk1.system_id = ?1");
        assert_eq!(ctx.into_fragment().params, vec![SqlParam::Integer(12)]);

        let mut ctx = QueryGeneratorContext::new("Observation", "tk1", &cache);
        visit_system(&mut ctx, "system_id", None, "http://snomed.info/sct");
        assert_eq!(
            ctx.sql(),
            "tk1.system_id IN (SELECT system_id FROM system WHERE value = ?1)"
        );
    }

    #[test]
    fn test_numeric_param_rejects_strings() {
        assert_eq!(
            numeric_param(FieldName::Number, &ExpressionValue::Integer(5)).unwrap(),
            SqlParam::Float(5.0)
        );
        assert!(numeric_param(FieldName::Number, &ExpressionValue::from("five")).is_err());
    }
}
