//! SQL fragments with numbered bound parameters.

use serde::{Deserialize, Serialize};

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values, in placeholder order.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a float parameter.
    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Adds a parameter and returns its placeholder (`?N`).
    pub fn add_param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("?{}", self.params.len())
    }

    /// Appends raw SQL text.
    pub fn push_str(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value, ValueRef};

        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlParam::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlParam::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_param_numbers_placeholders() {
        let mut frag = SqlFragment::new("a = ");
        let p1 = frag.add_param(SqlParam::string("x"));
        frag.push_str(&p1);
        frag.push_str(" AND b = ");
        let p2 = frag.add_param(SqlParam::integer(3));
        frag.push_str(&p2);

        assert_eq!(frag.sql, "a = ?1 AND b = ?2");
        assert_eq!(
            frag.params,
            vec![SqlParam::String("x".to_string()), SqlParam::Integer(3)]
        );
    }
}
