//! Database session capability.
//!
//! The rebuild only needs two things from a connection: run a statement and
//! run a parameterized query. Everything else about connecting lives behind
//! this trait.

pub mod mssql;

pub use mssql::MssqlSession;

use async_trait::async_trait;

use crate::schema::names_match;

/// Error raised by a session, boxed so any driver can plug in.
pub type SessionError = Box<dyn std::error::Error + Send + Sync>;

/// A scalar value in a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean (`BIT`).
    Bool(bool),
    /// Any integer type.
    Int(i64),
    /// Any character type.
    Text(String),
}

/// One result row with access by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a named value in place.
    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    /// Returns the value of a column, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| names_match(n, name))
            .map(|(_, v)| v)
    }

    /// Returns a text column, or `None` for NULL or a missing column.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(SqlValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns an integer column, or `None` for NULL or a missing column.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(SqlValue::Int(i)) => Some(*i),
            Some(SqlValue::Bool(b)) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Returns a boolean column; integers are true when non-zero.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(SqlValue::Bool(b)) => Some(*b),
            Some(SqlValue::Int(i)) => Some(*i != 0),
            _ => None,
        }
    }
}

/// A single database connection.
///
/// Statements run one at a time, in the order they are issued.
#[async_trait]
pub trait Session: Send {
    /// Executes a statement or batch and returns the number of rows affected.
    async fn execute(&mut self, sql: &str) -> Result<u64, SessionError>;

    /// Runs a query with bound string parameters and returns every row of the
    /// first result set.
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access_by_name() {
        let row = Row::new()
            .with("column_name", SqlValue::Text("Id".into()))
            .with("max_length", SqlValue::Int(4))
            .with("is_identity", SqlValue::Bool(true))
            .with("is_nullable", SqlValue::Int(0))
            .with("default_definition", SqlValue::Null);

        assert_eq!(row.get_str("COLUMN_NAME"), Some("Id"));
        assert_eq!(row.get_i64("max_length"), Some(4));
        assert_eq!(row.get_bool("is_identity"), Some(true));
        assert_eq!(row.get_bool("is_nullable"), Some(false));
        assert_eq!(row.get_str("default_definition"), None);
        assert_eq!(row.get("missing"), None);
    }
}
