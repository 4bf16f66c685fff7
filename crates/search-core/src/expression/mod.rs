//! Backend-independent search expressions.
//!
//! An [`Expression`] tree describes a search candidate without saying how it
//! is executed. Trees are built once by the caller and then read by the
//! query generators; nothing in this module performs I/O.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use helios_search_core::expression::{BinaryOperator, Expression, FieldName};
//! use helios_search_core::types::{SearchParameterInfo, SearchParamType};
//!
//! let birthdate = Arc::new(
//!     SearchParameterInfo::new(
//!         "http://hl7.org/fhir/SearchParameter/individual-birthdate",
//!         "birthdate",
//!         SearchParamType::Date,
//!     )
//!     .with_base(["Patient"]),
//! );
//!
//! // birthdate=ge2000-01-01
//! let expr = Expression::search_parameter(
//!     birthdate,
//!     Expression::binary(
//!         BinaryOperator::GreaterThanOrEqual,
//!         FieldName::DateTimeStart,
//!         "2000-01-01T00:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap(),
//!     ),
//! );
//! assert_eq!(expr.node_name(), "SearchParameter");
//! ```

mod field;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use field::{BinaryOperator, ExpressionValue, FieldName, MultiaryOperator, StringOperator};

use crate::types::SearchParameterInfo;

/// A comparison of one field against a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub field: FieldName,
    pub component_index: Option<usize>,
    pub value: ExpressionValue,
}

/// A string match on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringExpression {
    pub operator: StringOperator,
    pub field: FieldName,
    pub component_index: Option<usize>,
    pub value: String,
    pub ignore_case: bool,
}

/// Matches rows where the field has no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFieldExpression {
    pub field: FieldName,
    pub component_index: Option<usize>,
}

/// Restricts results to the members of a compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentExpression {
    pub compartment_type: String,
    pub compartment_id: String,
}

/// Scopes an inner expression to a single search parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterExpression {
    pub parameter: Arc<SearchParameterInfo>,
    pub expression: Box<Expression>,
}

/// Matches resources that have (or lack) any value for a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSearchParameterExpression {
    pub parameter: Arc<SearchParameterInfo>,
    pub is_missing: bool,
}

/// Follows a reference parameter to evaluate an expression on the target.
///
/// When `reversed` is set the direction flips (`_has`): the inner
/// expression applies to `resource_type`, whose `reference_parameter`
/// points back at the resource being searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedExpression {
    pub resource_type: String,
    pub reference_parameter: Arc<SearchParameterInfo>,
    pub target_resource_type: String,
    pub reversed: bool,
    pub expression: Box<Expression>,
}

/// Combines expressions with AND or OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiaryExpression {
    pub operator: MultiaryOperator,
    pub expressions: Vec<Expression>,
}

/// A node in a search expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    SearchParameter(SearchParameterExpression),
    Binary(BinaryExpression),
    String(StringExpression),
    MissingField(MissingFieldExpression),
    MissingSearchParameter(MissingSearchParameterExpression),
    Compartment(CompartmentExpression),
    Chained(ChainedExpression),
    Multiary(MultiaryExpression),
    Not(Box<Expression>),
}

impl Expression {
    /// Scopes `expression` to `parameter`.
    pub fn search_parameter(parameter: Arc<SearchParameterInfo>, expression: Expression) -> Self {
        Expression::SearchParameter(SearchParameterExpression {
            parameter,
            expression: Box::new(expression),
        })
    }

    /// Compares `field` against `value`.
    pub fn binary(
        operator: BinaryOperator,
        field: FieldName,
        value: impl Into<ExpressionValue>,
    ) -> Self {
        Expression::Binary(BinaryExpression {
            operator,
            field,
            component_index: None,
            value: value.into(),
        })
    }

    /// Shorthand for an equality comparison.
    pub fn equals(field: FieldName, value: impl Into<ExpressionValue>) -> Self {
        Self::binary(BinaryOperator::Equal, field, value)
    }

    /// Matches a string field.
    pub fn string(
        operator: StringOperator,
        field: FieldName,
        value: impl Into<String>,
        ignore_case: bool,
    ) -> Self {
        Expression::String(StringExpression {
            operator,
            field,
            component_index: None,
            value: value.into(),
            ignore_case,
        })
    }

    /// Case-sensitive exact string match.
    pub fn string_equals(field: FieldName, value: impl Into<String>) -> Self {
        Self::string(StringOperator::Equals, field, value, false)
    }

    /// Case-insensitive prefix match, the default FHIR string search.
    pub fn starts_with(field: FieldName, value: impl Into<String>) -> Self {
        Self::string(StringOperator::StartsWith, field, value, true)
    }

    /// Matches rows where `field` has no value.
    pub fn missing_field(field: FieldName) -> Self {
        Expression::MissingField(MissingFieldExpression {
            field,
            component_index: None,
        })
    }

    /// Matches resources with (`is_missing = false`) or without any value for `parameter`.
    pub fn missing_search_parameter(parameter: Arc<SearchParameterInfo>, is_missing: bool) -> Self {
        Expression::MissingSearchParameter(MissingSearchParameterExpression {
            parameter,
            is_missing,
        })
    }

    /// Restricts to members of `compartment_type/compartment_id`.
    pub fn compartment(compartment_type: impl Into<String>, compartment_id: impl Into<String>) -> Self {
        Expression::Compartment(CompartmentExpression {
            compartment_type: compartment_type.into(),
            compartment_id: compartment_id.into(),
        })
    }

    /// Forward chain: `resource_type.reference_parameter` points at `target_resource_type`.
    pub fn chained(
        resource_type: impl Into<String>,
        reference_parameter: Arc<SearchParameterInfo>,
        target_resource_type: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Expression::Chained(ChainedExpression {
            resource_type: resource_type.into(),
            reference_parameter,
            target_resource_type: target_resource_type.into(),
            reversed: false,
            expression: Box::new(expression),
        })
    }

    /// Reverse chain (`_has`): `resource_type.reference_parameter` points back at the searched type.
    pub fn reverse_chained(
        resource_type: impl Into<String>,
        reference_parameter: Arc<SearchParameterInfo>,
        target_resource_type: impl Into<String>,
        expression: Expression,
    ) -> Self {
        Expression::Chained(ChainedExpression {
            resource_type: resource_type.into(),
            reference_parameter,
            target_resource_type: target_resource_type.into(),
            reversed: true,
            expression: Box::new(expression),
        })
    }

    /// Conjunction of `expressions`.
    pub fn and(expressions: Vec<Expression>) -> Self {
        Expression::Multiary(MultiaryExpression {
            operator: MultiaryOperator::And,
            expressions,
        })
    }

    /// Disjunction of `expressions`.
    pub fn or(expressions: Vec<Expression>) -> Self {
        Expression::Multiary(MultiaryExpression {
            operator: MultiaryOperator::Or,
            expressions,
        })
    }

    /// Negation of `expression`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(expression: Expression) -> Self {
        Expression::Not(Box::new(expression))
    }

    /// Assigns a composite component index to every field node in this subtree.
    ///
    /// Nested search parameter scopes are left untouched.
    pub fn with_component_index(self, index: usize) -> Self {
        match self {
            Expression::Binary(mut e) => {
                e.component_index = Some(index);
                Expression::Binary(e)
            }
            Expression::String(mut e) => {
                e.component_index = Some(index);
                Expression::String(e)
            }
            Expression::MissingField(mut e) => {
                e.component_index = Some(index);
                Expression::MissingField(e)
            }
            Expression::Multiary(mut e) => {
                e.expressions = e
                    .expressions
                    .into_iter()
                    .map(|child| child.with_component_index(index))
                    .collect();
                Expression::Multiary(e)
            }
            Expression::Not(inner) => Expression::Not(Box::new(inner.with_component_index(index))),
            other => other,
        }
    }

    /// Returns the node kind, used in diagnostics.
    pub fn node_name(&self) -> &'static str {
        match self {
            Expression::SearchParameter(_) => "SearchParameter",
            Expression::Binary(_) => "Binary",
            Expression::String(_) => "String",
            Expression::MissingField(_) => "MissingField",
            Expression::MissingSearchParameter(_) => "MissingSearchParameter",
            Expression::Compartment(_) => "Compartment",
            Expression::Chained(_) => "Chained",
            Expression::Multiary(_) => "Multiary",
            Expression::Not(_) => "Not",
        }
    }

    /// Collects every search parameter referenced anywhere in this tree.
    pub fn referenced_parameters(&self) -> Vec<Arc<SearchParameterInfo>> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut Vec<Arc<SearchParameterInfo>>) {
        match self {
            Expression::SearchParameter(e) => {
                out.push(Arc::clone(&e.parameter));
                e.expression.collect_parameters(out);
            }
            Expression::MissingSearchParameter(e) => out.push(Arc::clone(&e.parameter)),
            Expression::Chained(e) => {
                out.push(Arc::clone(&e.reference_parameter));
                e.expression.collect_parameters(out);
            }
            Expression::Multiary(e) => {
                for child in &e.expressions {
                    child.collect_parameters(out);
                }
            }
            Expression::Not(inner) => inner.collect_parameters(out),
            Expression::Binary(_)
            | Expression::String(_)
            | Expression::MissingField(_)
            | Expression::Compartment(_) => {}
        }
    }
}
