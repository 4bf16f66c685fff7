//! SearchParameter Loader.
//!
//! Builds catalog records from:
//! - Embedded common parameters (compiled into the binary)
//! - FHIR `SearchParameter` JSON (single resource, array, or Bundle)
//! - Definition files on disk

use std::path::Path;

use serde_json::Value;

use crate::types::{SearchParamType, SearchParameterComponent, SearchParameterInfo};

use super::errors::LoaderError;

const FHIR_SP: &str = "http://hl7.org/fhir/SearchParameter";

/// Loader for SearchParameter definitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchParameterLoader;

impl SearchParameterLoader {
    /// Creates a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Returns the embedded common search parameters.
    pub fn load_embedded(&self) -> Vec<SearchParameterInfo> {
        core_search_parameters()
    }

    /// Loads SearchParameter resources from a JSON bundle, array or single resource.
    pub fn load_from_json(&self, json: &Value) -> Result<Vec<SearchParameterInfo>, LoaderError> {
        let mut params = Vec::new();

        // Bundle
        if let Some(entries) = json.get("entry").and_then(|e| e.as_array()) {
            for entry in entries {
                if let Some(resource) = entry.get("resource") {
                    if is_search_parameter(resource) {
                        params.push(self.parse_resource(resource)?);
                    }
                }
            }
        }
        // Array of SearchParameter resources
        else if let Some(array) = json.as_array() {
            for item in array {
                if is_search_parameter(item) {
                    params.push(self.parse_resource(item)?);
                }
            }
        }
        // Single SearchParameter
        else if is_search_parameter(json) {
            params.push(self.parse_resource(json)?);
        }

        Ok(params)
    }

    /// Loads parameters from a JSON file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<SearchParameterInfo>, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::FileLoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let json: Value =
            serde_json::from_str(&content).map_err(|e| LoaderError::FileLoadFailed {
                path: path.display().to_string(),
                message: format!("Invalid JSON: {}", e),
            })?;

        self.load_from_json(&json)
    }

    /// Parses a SearchParameter FHIR resource.
    pub fn parse_resource(&self, resource: &Value) -> Result<SearchParameterInfo, LoaderError> {
        let url = resource
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoaderError::MissingField {
                field: "url".to_string(),
                url: None,
            })?
            .to_string();

        let code = resource
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoaderError::MissingField {
                field: "code".to_string(),
                url: Some(url.clone()),
            })?
            .to_string();

        let type_str = resource
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoaderError::MissingField {
                field: "type".to_string(),
                url: Some(url.clone()),
            })?;

        let param_type = type_str.parse::<SearchParamType>().map_err(|_| {
            LoaderError::InvalidResource {
                message: format!("Unknown search parameter type: {}", type_str),
                url: Some(url.clone()),
            }
        })?;

        let mut param = SearchParameterInfo::new(url, code, param_type)
            .with_base(string_array(resource, "base"))
            .with_targets(string_array(resource, "target"));

        if let Some(expression) = resource
            .get("expression")
            .and_then(|v| v.as_str())
            .filter(|e| !e.is_empty())
        {
            param = param.with_expression(expression);
        }

        param.components = self.parse_components(resource)?;
        Ok(param)
    }

    /// Parses composite components.
    fn parse_components(
        &self,
        resource: &Value,
    ) -> Result<Vec<SearchParameterComponent>, LoaderError> {
        let Some(components) = resource.get("component").and_then(|v| v.as_array()) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(components.len());
        for comp in components {
            let definition = comp
                .get("definition")
                .and_then(|v| v.as_str())
                .ok_or_else(|| LoaderError::InvalidResource {
                    message: "Composite component missing definition".to_string(),
                    url: resource.get("url").and_then(|v| v.as_str()).map(String::from),
                })?;

            let mut component = SearchParameterComponent::new(definition);
            component.expression = comp
                .get("expression")
                .and_then(|v| v.as_str())
                .map(String::from);
            result.push(component);
        }

        Ok(result)
    }
}

fn is_search_parameter(value: &Value) -> bool {
    value.get("resourceType").and_then(|t| t.as_str()) == Some("SearchParameter")
}

fn string_array(resource: &Value, field: &str) -> Vec<String> {
    resource
        .get(field)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn sp(name: &str, code: &str, param_type: SearchParamType, base: &str) -> SearchParameterInfo {
    SearchParameterInfo::new(format!("{}/{}", FHIR_SP, name), code, param_type).with_base([base])
}

fn core_search_parameters() -> Vec<SearchParameterInfo> {
    use SearchParamType::*;

    vec![
        sp("Resource-id", "_id", Token, "Resource").with_expression("id"),
        sp("Resource-lastUpdated", "_lastUpdated", Date, "Resource")
            .with_expression("meta.lastUpdated"),
        sp("Resource-type", "_type", Token, "Resource"),
        sp("Resource-tag", "_tag", Token, "Resource").with_expression("meta.tag"),
        sp("Resource-profile", "_profile", Uri, "Resource").with_expression("meta.profile"),
        sp("Resource-security", "_security", Token, "Resource").with_expression("meta.security"),
        sp("Resource-source", "_source", Uri, "Resource").with_expression("meta.source"),
        sp("Resource-query", "_query", Special, "Resource"),
        sp("DomainResource-text", "_text", Special, "DomainResource"),
        sp("Patient-name", "name", String, "Patient").with_expression("Patient.name"),
        sp("Patient-identifier", "identifier", Token, "Patient")
            .with_expression("Patient.identifier"),
        sp("individual-birthdate", "birthdate", Date, "Patient")
            .with_expression("Patient.birthDate"),
        sp("Observation-subject", "subject", Reference, "Observation")
            .with_expression("Observation.subject")
            .with_targets(["Patient", "Group", "Device", "Location"]),
        sp("clinical-code", "code", Token, "Observation").with_expression("Observation.code"),
        sp("Observation-value-quantity", "value-quantity", Quantity, "Observation")
            .with_expression("(Observation.value as Quantity)"),
        sp("Observation-code-value-quantity", "code-value-quantity", Composite, "Observation")
            .with_expression("Observation")
            .with_component(SearchParameterComponent::new(format!(
                "{}/clinical-code",
                FHIR_SP
            )))
            .with_component(SearchParameterComponent::new(format!(
                "{}/Observation-value-quantity",
                FHIR_SP
            ))),
        sp("Encounter-date", "date", Date, "Encounter").with_expression("Encounter.period"),
        sp("RiskAssessment-probability", "probability", Number, "RiskAssessment")
            .with_expression("RiskAssessment.prediction.probability"),
    ]
}
