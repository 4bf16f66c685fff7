//! Registry of query generators, one per parameter category.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{SearchParamType, SearchParameterInfo};

use super::generators::{
    CompartmentQueryGenerator, CompositeQueryGenerator, DateTimeQueryGenerator,
    NumberQueryGenerator, QuantityQueryGenerator, QueryCategory, ReferenceQueryGenerator,
    ResourceTableQueryGenerator, SearchParameterQueryGenerator, StringQueryGenerator,
    TokenQueryGenerator, UriQueryGenerator,
};

/// Codes of the parameters stored on the resource table itself.
const RESOURCE_TABLE_CODES: [&str; 3] = ["_id", "_lastUpdated", "_type"];

/// Maps each [`QueryCategory`] to its generator.
///
/// The registry always holds exactly one generator for every category in
/// [`QueryCategory::ALL`]; [`with_generator`](Self::with_generator) replaces
/// an entry rather than adding a second one.
#[derive(Debug, Clone)]
pub struct QueryGeneratorRegistry {
    generators: HashMap<QueryCategory, Arc<dyn SearchParameterQueryGenerator>>,
}

impl Default for QueryGeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryGeneratorRegistry {
    /// Creates a registry with the built-in generator for every category.
    pub fn new() -> Self {
        let mut generators: HashMap<QueryCategory, Arc<dyn SearchParameterQueryGenerator>> =
            HashMap::new();

        for category in QueryCategory::ALL {
            let generator: Arc<dyn SearchParameterQueryGenerator> = match category {
                QueryCategory::ResourceTable => Arc::new(ResourceTableQueryGenerator),
                QueryCategory::Token => Arc::new(TokenQueryGenerator),
                QueryCategory::String => Arc::new(StringQueryGenerator),
                QueryCategory::DateTime => Arc::new(DateTimeQueryGenerator),
                QueryCategory::Number => Arc::new(NumberQueryGenerator),
                QueryCategory::Quantity => Arc::new(QuantityQueryGenerator),
                QueryCategory::Uri => Arc::new(UriQueryGenerator),
                QueryCategory::Reference => Arc::new(ReferenceQueryGenerator),
                QueryCategory::Compartment => Arc::new(CompartmentQueryGenerator),
                composite => match CompositeQueryGenerator::for_category(composite) {
                    Some(generator) => Arc::new(generator),
                    None => continue,
                },
            };
            generators.insert(category, generator);
        }

        Self { generators }
    }

    /// Replaces the generator registered for its category.
    pub fn with_generator(mut self, generator: Arc<dyn SearchParameterQueryGenerator>) -> Self {
        self.generators.insert(generator.category(), generator);
        self
    }

    /// Returns the generator for a category.
    pub fn get(&self, category: QueryCategory) -> Option<&Arc<dyn SearchParameterQueryGenerator>> {
        self.generators.get(&category)
    }

    /// Number of registered generators.
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Returns true if no generators are registered.
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Determines the category of a parameter, if any generator can serve it.
    pub fn resolve(&self, parameter: &SearchParameterInfo) -> Option<QueryCategory> {
        let category = resolve_category(parameter)?;
        self.generators.contains_key(&category).then_some(category)
    }

    /// Returns the generator able to translate expressions on `parameter`.
    pub fn generator_for(
        &self,
        parameter: &SearchParameterInfo,
    ) -> Option<&Arc<dyn SearchParameterQueryGenerator>> {
        self.resolve(parameter).and_then(|c| self.get(c))
    }
}

fn resolve_category(parameter: &SearchParameterInfo) -> Option<QueryCategory> {
    if RESOURCE_TABLE_CODES.contains(&parameter.code.as_str()) {
        return Some(QueryCategory::ResourceTable);
    }

    match parameter.param_type {
        SearchParamType::Token => Some(QueryCategory::Token),
        SearchParamType::String => Some(QueryCategory::String),
        SearchParamType::Date => Some(QueryCategory::DateTime),
        SearchParamType::Number => Some(QueryCategory::Number),
        SearchParamType::Quantity => Some(QueryCategory::Quantity),
        SearchParamType::Uri => Some(QueryCategory::Uri),
        SearchParamType::Reference => Some(QueryCategory::Reference),
        SearchParamType::Composite => resolve_composite(parameter),
        SearchParamType::Special => None,
    }
}

fn resolve_composite(parameter: &SearchParameterInfo) -> Option<QueryCategory> {
    use SearchParamType::*;

    let types: Option<Vec<SearchParamType>> = parameter.component_types().into_iter().collect();
    match types?.as_slice() {
        [Token, Token] => Some(QueryCategory::TokenToken),
        [Token, Date] => Some(QueryCategory::TokenDateTime),
        [Token, Quantity] => Some(QueryCategory::TokenQuantity),
        [Token, String] => Some(QueryCategory::TokenString),
        [Token, Number, Number] => Some(QueryCategory::TokenNumberNumber),
        [Reference, Token] => Some(QueryCategory::ReferenceToken),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchParameterComponent;

    fn composite(types: &[SearchParamType]) -> SearchParameterInfo {
        types.iter().enumerate().fold(
            SearchParameterInfo::new(
                "http://example.org/SearchParameter/composite",
                "composite",
                SearchParamType::Composite,
            ),
            |param, (i, t)| {
                param.with_component(
                    SearchParameterComponent::new(format!("http://example.org/c{}", i))
                        .with_type(*t),
                )
            },
        )
    }

    #[test]
    fn test_exactly_one_generator_per_category() {
        let registry = QueryGeneratorRegistry::new();
        assert_eq!(registry.len(), QueryCategory::ALL.len());
        for category in QueryCategory::ALL {
            let generator = registry.get(category).expect("generator registered");
            assert_eq!(generator.category(), category);
        }
    }

    #[test]
    fn test_with_generator_replaces() {
        let registry = QueryGeneratorRegistry::new().with_generator(Arc::new(TokenQueryGenerator));
        assert_eq!(registry.len(), QueryCategory::ALL.len());
    }

    #[test]
    fn test_resolve_simple_types() {
        let registry = QueryGeneratorRegistry::new();
        let cases = [
            (SearchParamType::Token, Some(QueryCategory::Token)),
            (SearchParamType::String, Some(QueryCategory::String)),
            (SearchParamType::Date, Some(QueryCategory::DateTime)),
            (SearchParamType::Number, Some(QueryCategory::Number)),
            (SearchParamType::Quantity, Some(QueryCategory::Quantity)),
            (SearchParamType::Uri, Some(QueryCategory::Uri)),
            (SearchParamType::Reference, Some(QueryCategory::Reference)),
            (SearchParamType::Special, None),
        ];
        for (param_type, expected) in cases {
            let param = SearchParameterInfo::new("http://example.org/sp", "sp", param_type);
            assert_eq!(registry.resolve(&param), expected, "type {}", param_type);
        }
    }

    #[test]
    fn test_resolve_resource_table_codes() {
        let registry = QueryGeneratorRegistry::new();
        for code in ["_id", "_lastUpdated", "_type"] {
            let param = SearchParameterInfo::new(
                format!("http://hl7.org/fhir/SearchParameter/Resource{}", code),
                code,
                SearchParamType::Token,
            );
            assert_eq!(registry.resolve(&param), Some(QueryCategory::ResourceTable));
        }
    }

    #[test]
    fn test_resolve_composites() {
        use SearchParamType::*;
        let registry = QueryGeneratorRegistry::new();
        assert_eq!(
            registry.resolve(&composite(&[Token, Quantity])),
            Some(QueryCategory::TokenQuantity)
        );
        assert_eq!(
            registry.resolve(&composite(&[Token, Number, Number])),
            Some(QueryCategory::TokenNumberNumber)
        );
        assert_eq!(
            registry.resolve(&composite(&[Reference, Token])),
            Some(QueryCategory::ReferenceToken)
        );
        assert_eq!(registry.resolve(&composite(&[String, String])), None);

        let unresolved = SearchParameterInfo::new("http://x", "x", Composite)
            .with_component(SearchParameterComponent::new("http://unknown"));
        assert_eq!(registry.resolve(&unresolved), None);
    }
}
