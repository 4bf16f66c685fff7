//! Procedures shipped with the search core.
//!
//! Bodies are sequences of `;`-separated SQL statements using the named
//! arguments `:resource_type` and `:resource_id`.

use crate::error::ProcedureError;
use crate::query::tables::{self, INDEX_TABLES, RESOURCE_SURROGATE_ID};

use super::procedure::StoredProcedure;

/// Logical name of the hard-delete procedure.
pub const HARD_DELETE: &str = "hardDelete";

/// Logical name of the history purge procedure.
pub const PURGE_HISTORY: &str = "purgeHistory";

/// Every built-in procedure.
pub fn builtin_procedures() -> Result<Vec<StoredProcedure>, ProcedureError> {
    Ok(vec![
        StoredProcedure::new(HARD_DELETE, hard_delete_body())?,
        StoredProcedure::new(PURGE_HISTORY, purge_history_body())?,
    ])
}

/// Removes every version of one resource together with its index rows.
fn hard_delete_body() -> String {
    let selector = format!(
        "SELECT {id} FROM {resource} WHERE {rt} = :resource_type AND {rid} = :resource_id",
        id = RESOURCE_SURROGATE_ID,
        resource = tables::RESOURCE.name,
        rt = tables::resource::RESOURCE_TYPE,
        rid = tables::resource::RESOURCE_ID,
    );

    let mut body = String::new();
    for table in INDEX_TABLES {
        body.push_str(&format!(
            "DELETE FROM {} WHERE {} IN ({});\n",
            table.name, RESOURCE_SURROGATE_ID, selector
        ));
    }
    body.push_str(&format!(
        "DELETE FROM {} WHERE {} = :resource_type AND {} = :resource_id;\n",
        tables::RESOURCE.name,
        tables::resource::RESOURCE_TYPE,
        tables::resource::RESOURCE_ID
    ));
    body
}

/// Removes historical versions of every resource of one type.
fn purge_history_body() -> String {
    let selector = format!(
        "SELECT {id} FROM {resource} WHERE {rt} = :resource_type AND is_history = 1",
        id = RESOURCE_SURROGATE_ID,
        resource = tables::RESOURCE.name,
        rt = tables::resource::RESOURCE_TYPE,
    );

    let mut body = String::new();
    for table in INDEX_TABLES {
        body.push_str(&format!(
            "DELETE FROM {} WHERE {} IN ({});\n",
            table.name, RESOURCE_SURROGATE_ID, selector
        ));
    }
    body.push_str(&format!(
        "DELETE FROM {} WHERE {} = :resource_type AND is_history = 1;\n",
        tables::RESOURCE.name,
        tables::resource::RESOURCE_TYPE
    ));
    body
}

/// Splits a procedure body into its statements.
pub fn statements(body: &str) -> impl Iterator<Item = &str> {
    body.split(';').map(str::trim).filter(|s| !s.is_empty())
}
