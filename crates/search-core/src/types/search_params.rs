//! Search parameter definition types.
//!
//! This module defines the value type of a search parameter and the
//! catalog record ([`SearchParameterInfo`]) that carries its runtime
//! searchability flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// FHIR search parameter types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (_text, _query, etc.).
    Special,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// A component of a composite search parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterComponent {
    /// URL of the SearchParameter this component refers to.
    pub definition: String,

    /// FHIRPath expression relative to the composite's expression.
    pub expression: Option<String>,

    /// Value type of the referenced parameter, filled in by the catalog.
    pub param_type: Option<SearchParamType>,
}

impl SearchParameterComponent {
    /// Creates a component referring to another parameter definition.
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            expression: None,
            param_type: None,
        }
    }

    /// Sets the resolved component type.
    pub fn with_type(mut self, param_type: SearchParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }
}

/// A search parameter as held by the in-memory catalog.
///
/// The three flags describe whether the parameter may currently be used
/// in queries. Fresh definitions are searchable and supported; the status
/// manager overwrites the flags from the persisted status during
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterInfo {
    /// Canonical URL (unique key).
    pub url: String,

    /// The code used in search URLs (e.g. "name", "_id").
    pub code: String,

    /// Value type of the parameter.
    #[serde(rename = "type")]
    pub param_type: SearchParamType,

    /// Resource types this parameter applies to.
    #[serde(default)]
    pub base: Vec<String>,

    /// Target resource types for reference parameters.
    #[serde(default)]
    pub target: Vec<String>,

    /// FHIRPath expression used for indexing.
    #[serde(default)]
    pub expression: Option<String>,

    /// Components for composite parameters.
    #[serde(default)]
    pub components: Vec<SearchParameterComponent>,

    /// Whether queries may use this parameter.
    #[serde(default = "default_true")]
    pub is_searchable: bool,

    /// Whether the query engine can translate this parameter.
    #[serde(default = "default_true")]
    pub is_supported: bool,

    /// Whether only part of the parameter's expression is indexed.
    #[serde(default)]
    pub is_partially_supported: bool,
}

fn default_true() -> bool {
    true
}

impl SearchParameterInfo {
    /// Creates a new parameter with default flags.
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: SearchParamType,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            base: Vec::new(),
            target: Vec::new(),
            expression: None,
            components: Vec::new(),
            is_searchable: true,
            is_supported: true,
            is_partially_supported: false,
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the reference target types.
    pub fn with_targets<I, S>(mut self, target: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = target.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the FHIRPath expression.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Appends a composite component.
    pub fn with_component(mut self, component: SearchParameterComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Sets all three status flags at once.
    pub fn with_flags(
        mut self,
        is_searchable: bool,
        is_supported: bool,
        is_partially_supported: bool,
    ) -> Self {
        self.is_searchable = is_searchable;
        self.is_supported = is_supported;
        self.is_partially_supported = is_partially_supported;
        self
    }

    /// Returns the current flags as `(searchable, supported, partially_supported)`.
    pub fn flags(&self) -> (bool, bool, bool) {
        (
            self.is_searchable,
            self.is_supported,
            self.is_partially_supported,
        )
    }

    /// Returns true if this parameter applies to the given resource type.
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.base
            .iter()
            .any(|b| b == resource_type || b == "Resource" || b == "DomainResource")
    }

    /// Returns the resolved component types, in component order.
    pub fn component_types(&self) -> Vec<Option<SearchParamType>> {
        self.components.iter().map(|c| c.param_type).collect()
    }

    /// Returns true if this is a composite parameter.
    pub fn is_composite(&self) -> bool {
        self.param_type == SearchParamType::Composite
    }
}
