//! Field names, operators and literal values used by expression nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The semantic role of a value within its search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldName {
    /// Start of a date range.
    DateTimeStart,
    /// End of a date range.
    DateTimeEnd,
    /// Derived flag: the date range spans more than one day.
    DateTimeIsLongerThanADay,
    /// A single numeric value.
    Number,
    /// Lower bound of a numeric range.
    NumberLow,
    /// Upper bound of a numeric range.
    NumberHigh,
    /// A single quantity value.
    Quantity,
    /// Lower bound of a quantity range.
    QuantityLow,
    /// Upper bound of a quantity range.
    QuantityHigh,
    /// Unit code of a quantity.
    QuantityCode,
    /// Unit system of a quantity.
    QuantitySystem,
    /// Base URI of an absolute reference.
    ReferenceBaseUri,
    /// Resource type of a reference.
    ReferenceResourceType,
    /// Resource id of a reference.
    ReferenceResourceId,
    /// A string value.
    String,
    /// Code of a token.
    TokenCode,
    /// System of a token.
    TokenSystem,
    /// A URI value.
    Uri,
    /// Logical id of the resource (`_id`).
    ResourceId,
    /// Resource type of the resource (`_type`).
    ResourceType,
    /// Last update time of the resource (`_lastUpdated`).
    LastUpdated,
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Comparison operators for binary expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl BinaryOperator {
    /// Returns the SQL comparison operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
        }
    }
}

/// Matching operators for string expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringOperator {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
    NotStartsWith,
    NotEndsWith,
    NotContains,
}

impl StringOperator {
    /// Returns true for the negated operators.
    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            StringOperator::NotStartsWith | StringOperator::NotEndsWith | StringOperator::NotContains
        )
    }
}

/// Combinators for groups of expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiaryOperator {
    And,
    Or,
}

impl MultiaryOperator {
    /// Returns the SQL keyword for this combinator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            MultiaryOperator::And => "AND",
            MultiaryOperator::Or => "OR",
        }
    }
}

/// A literal compared against a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionValue {
    String(String),
    Integer(i64),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Boolean(bool),
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionValue::String(s) => write!(f, "'{}'", s),
            ExpressionValue::Integer(i) => write!(f, "{}", i),
            ExpressionValue::Decimal(d) => write!(f, "{}", d),
            ExpressionValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            ExpressionValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ExpressionValue {
    fn from(s: &str) -> Self {
        ExpressionValue::String(s.to_string())
    }
}

impl From<String> for ExpressionValue {
    fn from(s: String) -> Self {
        ExpressionValue::String(s)
    }
}

impl From<i64> for ExpressionValue {
    fn from(n: i64) -> Self {
        ExpressionValue::Integer(n)
    }
}

impl From<Decimal> for ExpressionValue {
    fn from(d: Decimal) -> Self {
        ExpressionValue::Decimal(d)
    }
}

impl From<DateTime<Utc>> for ExpressionValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ExpressionValue::DateTime(dt)
    }
}

impl From<bool> for ExpressionValue {
    fn from(b: bool) -> Self {
        ExpressionValue::Boolean(b)
    }
}
