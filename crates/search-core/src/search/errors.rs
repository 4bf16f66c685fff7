//! Search-parameter specific error types.
//!
//! This module provides error types for:
//! - Loading and parsing SearchParameter resources
//! - Status registry reconciliation

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error during SearchParameter loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoaderError {
    /// Invalid SearchParameter resource structure.
    InvalidResource {
        /// Description of what was invalid.
        message: String,
        /// URL of the problematic parameter, if known.
        url: Option<String>,
    },

    /// Missing required field in SearchParameter.
    MissingField {
        /// Name of the missing field.
        field: String,
        /// URL of the parameter.
        url: Option<String>,
    },

    /// Failed to read a definitions file.
    FileLoadFailed {
        /// Path to the file.
        path: String,
        /// Error message.
        message: String,
    },
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::InvalidResource { message, url } => {
                if let Some(url) = url {
                    write!(f, "Invalid SearchParameter '{}': {}", url, message)
                } else {
                    write!(f, "Invalid SearchParameter: {}", message)
                }
            }
            LoaderError::MissingField { field, url } => {
                if let Some(url) = url {
                    write!(
                        f,
                        "SearchParameter '{}' missing required field '{}'",
                        url, field
                    )
                } else {
                    write!(f, "SearchParameter missing required field '{}'", field)
                }
            }
            LoaderError::FileLoadFailed { path, message } => {
                write!(f, "Failed to load parameters from '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

/// Error during status registry operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryError {
    /// Two catalog entries share one URL.
    DuplicateUrl {
        /// The duplicate URL.
        url: String,
    },

    /// Parameter not found in the catalog.
    NotFound {
        /// The URL or code that was not found.
        identifier: String,
    },

    /// A persisted status value could not be interpreted.
    InvalidStatus {
        /// The parameter URL.
        url: String,
        /// The stored value.
        value: String,
    },

    /// The support resolver could not decide for a parameter.
    SupportResolution {
        /// The parameter URL.
        url: String,
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateUrl { url } => {
                write!(f, "SearchParameter with URL '{}' already exists", url)
            }
            RegistryError::NotFound { identifier } => {
                write!(f, "SearchParameter '{}' not found", identifier)
            }
            RegistryError::InvalidStatus { url, value } => {
                write!(f, "SearchParameter '{}' has invalid status '{}'", url, value)
            }
            RegistryError::SupportResolution { url, message } => {
                write!(
                    f,
                    "Could not resolve support for SearchParameter '{}': {}",
                    url, message
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::MissingField {
            field: "type".to_string(),
            url: Some("http://example.org/SearchParameter/test".to_string()),
        };
        assert!(err.to_string().contains("type"));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::DuplicateUrl {
            url: "http://example.org/sp".to_string(),
        };
        assert!(err.to_string().contains("already exists"));

        let err = RegistryError::InvalidStatus {
            url: "http://example.org/sp".to_string(),
            value: "Pending".to_string(),
        };
        assert!(err.to_string().contains("Pending"));
    }
}
