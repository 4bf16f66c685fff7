//! Persisted search parameter status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a search parameter in a data store.
///
/// ```text
/// (unknown) ──discover──▶ Supported ──enable──▶ Enabled
///                              │                   │
///                              └──disable──▶ Disabled ◀──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchParameterStatus {
    /// Known and translatable, but not yet indexed for search.
    Supported,
    /// Indexed and usable in queries.
    Enabled,
    /// Switched off, usually because the backend could not serve it.
    Disabled,
}

impl SearchParameterStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchParameterStatus::Supported => "Supported",
            SearchParameterStatus::Enabled => "Enabled",
            SearchParameterStatus::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for SearchParameterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchParameterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supported" => Ok(SearchParameterStatus::Supported),
            "enabled" => Ok(SearchParameterStatus::Enabled),
            "disabled" => Ok(SearchParameterStatus::Disabled),
            _ => Err(format!("unknown search parameter status: {}", s)),
        }
    }
}

/// The persisted status record of one search parameter, keyed by URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSearchParameterStatus {
    /// Canonical URL of the parameter.
    pub uri: String,

    /// Current lifecycle status.
    pub status: SearchParameterStatus,

    /// Whether only part of the parameter is indexed.
    pub is_partially_supported: bool,

    /// When this record was last written.
    pub last_updated: DateTime<Utc>,
}

impl ResourceSearchParameterStatus {
    /// Creates a record stamped with the current time.
    pub fn new(uri: impl Into<String>, status: SearchParameterStatus) -> Self {
        Self {
            uri: uri.into(),
            status,
            is_partially_supported: false,
            last_updated: Utc::now(),
        }
    }

    /// Sets the partial-support flag.
    pub fn with_partially_supported(mut self, partially_supported: bool) -> Self {
        self.is_partially_supported = partially_supported;
        self
    }
}
