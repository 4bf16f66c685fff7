//! Writes resources and their search index rows.
//!
//! Index values are supplied by the caller; extracting them from resource
//! content is outside this crate.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, Transaction, params};
use serde_json::Value;
use tracing::debug;

use crate::error::StorageResult;
use crate::query::tables;
use crate::types::ResourceRecord;

use super::SqliteBackend;

/// One indexed value of one search parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Token {
        system: Option<String>,
        code: String,
    },
    String(String),
    DateTime {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Number(f64),
    Quantity {
        system: Option<String>,
        code: Option<String>,
        value: f64,
    },
    Uri(String),
    Reference {
        base_uri: Option<String>,
        resource_type: String,
        resource_id: String,
    },
    Compartment {
        compartment_type: String,
        resource_id: String,
    },
    /// Value of a token + quantity composite parameter.
    TokenQuantity {
        system: Option<String>,
        code: String,
        quantity_system: Option<String>,
        quantity_code: Option<String>,
        value: f64,
    },
}

/// An index value bound to the parameter it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub param_uri: String,
    pub value: IndexValue,
}

impl IndexEntry {
    pub fn new(param_uri: impl Into<String>, value: IndexValue) -> Self {
        Self {
            param_uri: param_uri.into(),
            value,
        }
    }
}

/// A new version of a resource with its index values.
#[derive(Debug, Clone)]
pub struct ResourceWrite {
    pub resource_type: String,
    pub resource_id: String,
    pub content: Value,
    pub entries: Vec<IndexEntry>,
}

impl ResourceWrite {
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            content,
            entries: Vec::new(),
        }
    }

    pub fn with_index(mut self, param_uri: impl Into<String>, value: IndexValue) -> Self {
        self.entries.push(IndexEntry::new(param_uri, value));
        self
    }
}

impl SqliteBackend {
    /// Stores a new current version of a resource.
    ///
    /// The previous current version, if any, is marked as history and keeps
    /// its index rows. New system URIs are added to the `system` table and
    /// to the system id cache.
    pub fn write_resource(&self, write: ResourceWrite) -> StorageResult<ResourceRecord> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let previous: Option<i64> = tx
            .query_row(
                "SELECT version FROM resource
                 WHERE resource_type = ?1 AND resource_id = ?2 AND is_history = 0",
                params![write.resource_type, write.resource_id],
                |row| row.get(0),
            )
            .optional()?;

        if previous.is_some() {
            tx.execute(
                "UPDATE resource SET is_history = 1
                 WHERE resource_type = ?1 AND resource_id = ?2 AND is_history = 0",
                params![write.resource_type, write.resource_id],
            )?;
        }
        let version = previous.map_or(1, |v| v + 1);

        tx.execute(
            "INSERT INTO resource
             (resource_type, resource_id, version, last_updated, raw_resource)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                write.resource_type,
                write.resource_id,
                version,
                now.timestamp_millis(),
                serde_json::to_string(&write.content)?,
            ],
        )?;
        let surrogate_id = tx.last_insert_rowid();

        let mut new_systems = Vec::new();
        for entry in &write.entries {
            insert_index(&tx, surrogate_id, entry, &mut new_systems)?;
        }

        tx.commit()?;

        for (system, id) in new_systems {
            self.system_cache().insert(system, id);
        }

        debug!(
            resource_type = %write.resource_type,
            resource_id = %write.resource_id,
            version,
            indexes = write.entries.len(),
            "Wrote resource"
        );

        Ok(ResourceRecord {
            surrogate_id,
            resource_type: write.resource_type,
            resource_id: write.resource_id,
            version,
            last_updated: now,
            content: write.content,
        })
    }
}

fn system_id(
    tx: &Transaction<'_>,
    system: Option<&str>,
    new_systems: &mut Vec<(String, i64)>,
) -> StorageResult<Option<i64>> {
    let Some(system) = system else {
        return Ok(None);
    };
    tx.execute("INSERT OR IGNORE INTO system (value) VALUES (?1)", [system])?;
    let id: i64 = tx.query_row(
        "SELECT system_id FROM system WHERE value = ?1",
        [system],
        |row| row.get(0),
    )?;
    new_systems.push((system.to_string(), id));
    Ok(Some(id))
}

fn insert_index(
    tx: &Transaction<'_>,
    surrogate_id: i64,
    entry: &IndexEntry,
    new_systems: &mut Vec<(String, i64)>,
) -> StorageResult<()> {
    let uri = entry.param_uri.as_str();

    match &entry.value {
        IndexValue::Token { system, code } => {
            let system_id = system_id(tx, system.as_deref(), new_systems)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri, system_id, code)
                     VALUES (?1, ?2, ?3, ?4)",
                    tables::TOKEN.name
                ),
                params![surrogate_id, uri, system_id, code],
            )?;
        }
        IndexValue::String(text) => {
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri, text, text_normalized)
                     VALUES (?1, ?2, ?3, ?4)",
                    tables::STRING.name
                ),
                params![surrogate_id, uri, text, text.to_lowercase()],
            )?;
        }
        IndexValue::DateTime { start, end } => {
            let longer = (*end - *start) > Duration::days(1);
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri,
                        start_date_time, end_date_time, is_longer_than_a_day)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    tables::DATE_TIME.name
                ),
                params![
                    surrogate_id,
                    uri,
                    start.timestamp_millis(),
                    end.timestamp_millis(),
                    longer
                ],
            )?;
        }
        IndexValue::Number(value) => {
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri,
                        single_value, low_value, high_value)
                     VALUES (?1, ?2, ?3, ?3, ?3)",
                    tables::NUMBER.name
                ),
                params![surrogate_id, uri, value],
            )?;
        }
        IndexValue::Quantity {
            system,
            code,
            value,
        } => {
            let system_id = system_id(tx, system.as_deref(), new_systems)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri, system_id,
                        quantity_code, single_value, low_value, high_value)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)",
                    tables::QUANTITY.name
                ),
                params![surrogate_id, uri, system_id, code, value],
            )?;
        }
        IndexValue::Uri(value) => {
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri, uri)
                     VALUES (?1, ?2, ?3)",
                    tables::URI.name
                ),
                params![surrogate_id, uri, value],
            )?;
        }
        IndexValue::Reference {
            base_uri,
            resource_type,
            resource_id,
        } => {
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri, base_uri,
                        reference_resource_type, reference_resource_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    tables::REFERENCE.name
                ),
                params![surrogate_id, uri, base_uri, resource_type, resource_id],
            )?;
        }
        IndexValue::Compartment {
            compartment_type,
            resource_id,
        } => {
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri,
                        compartment_type, reference_resource_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    tables::COMPARTMENT.name
                ),
                params![surrogate_id, uri, compartment_type, resource_id],
            )?;
        }
        IndexValue::TokenQuantity {
            system,
            code,
            quantity_system,
            quantity_code,
            value,
        } => {
            let system_id1 = system_id(tx, system.as_deref(), new_systems)?;
            let system_id2 = system_id(tx, quantity_system.as_deref(), new_systems)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (resource_surrogate_id, search_param_uri,
                        system_id1, code1, system_id2, quantity_code2,
                        single_value2, low_value2, high_value2)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?7)",
                    tables::TOKEN_QUANTITY.name
                ),
                params![
                    surrogate_id,
                    uri,
                    system_id1,
                    code,
                    system_id2,
                    quantity_code,
                    value
                ],
            )?;
        }
    }

    Ok(())
}
