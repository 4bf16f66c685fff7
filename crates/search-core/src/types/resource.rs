//! Resource rows returned by search queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A current resource version as stored in the resource table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Store-assigned, monotonically increasing row id used for paging.
    pub surrogate_id: i64,

    /// The FHIR resource type.
    pub resource_type: String,

    /// The logical id.
    pub resource_id: String,

    /// Version number, starting at 1.
    pub version: i64,

    /// When this version was written.
    pub last_updated: DateTime<Utc>,

    /// The resource body.
    pub content: Value,
}

impl ResourceRecord {
    /// Returns the `Type/id` reference string.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_id)
    }
}
