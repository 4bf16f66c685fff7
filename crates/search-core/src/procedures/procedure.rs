//! Content-addressed stored procedures.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ProcedureError;

const NAME_PATTERN: &str = "^[a-z][A-Za-z0-9]*$";

static NAME_REGEX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(NAME_PATTERN));

fn name_regex(name: &str) -> Result<&'static Regex, ProcedureError> {
    NAME_REGEX
        .as_ref()
        .map_err(|e| ProcedureError::InvalidName {
            name: format!("{} ({})", name, e),
        })
}

/// A procedure body together with its versioned name.
///
/// The full name is `name_<hex sha-256 of body>`, so byte-identical bodies
/// always deploy under the same name and any edit deploys alongside the
/// previous version instead of replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProcedure {
    name: String,
    body: String,
    content_hash: String,
    full_name: String,
}

impl StoredProcedure {
    /// Creates a procedure, validating the logical name.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, ProcedureError> {
        let name = name.into();
        let body = body.into();

        if !name_regex(&name)?.is_match(&name) {
            return Err(ProcedureError::InvalidName { name });
        }

        let content_hash = content_hash(body.as_bytes());
        let full_name = format!("{}_{}", name, content_hash);
        Ok(Self {
            name,
            body,
            content_hash,
            full_name,
        })
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Procedure body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Hex SHA-256 of the body.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Versioned name, `name_hash`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

/// Hex SHA-256 of `body`.
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
