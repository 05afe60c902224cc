//! Column and table descriptions.
//!
//! A rebuild works on one shape for every column, whether it was read from
//! the catalog or requested by the caller. The order of a planned column list
//! is the physical column order of the rebuilt table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReorderError, Result};

/// Where a column in a planned list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnOrigin {
    /// Read from the catalog; its data is copied from the source table.
    Existing,
    /// Requested by the caller; its data is backfilled.
    Inserted,
}

/// One physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, case preserved.
    pub name: String,
    /// Fully parameterized type, e.g. `VARCHAR(50)` or `DECIMAL(18,2)`.
    pub declared_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether the column is an identity column.
    pub identity: bool,
    /// Default expression in engine syntax, if any.
    pub default_expression: Option<String>,
    /// Where the column came from.
    pub origin: ColumnOrigin,
}

impl ColumnDescriptor {
    /// Creates a nullable, non-identity column read from the catalog.
    #[must_use]
    pub fn existing(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            identity: false,
            default_expression: None,
            origin: ColumnOrigin::Existing,
        }
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as an identity column.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_expression(mut self, expr: impl Into<String>) -> Self {
        self.default_expression = Some(expr.into());
        self
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }
}

/// Compares two identifiers the way a case-insensitive collation does,
/// folding every letter to lowercase, not only ASCII ones.
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Placement of a new column relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Immediately before the anchor.
    Before,
    /// Immediately after the anchor.
    After,
}

impl FromStr for Position {
    type Err = ReorderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            _ => Err(ReorderError::InvalidPosition(s.to_string())),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// A new column to add to the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionRequest {
    /// Column name.
    pub name: String,
    /// Fully parameterized type.
    pub declared_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether the column is an identity column.
    pub identity: bool,
    /// Column default, also used to backfill existing rows.
    pub default_expression: Option<String>,
    /// Name of the column this one is placed relative to.
    pub anchor: String,
    /// Before or after the anchor.
    pub position: Position,
}

impl InsertionRequest {
    /// Creates a nullable column placed after `anchor`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        anchor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            identity: false,
            default_expression: None,
            anchor: anchor.into(),
            position: Position::After,
        }
    }

    /// Places the column before its anchor.
    #[must_use]
    pub fn before(mut self) -> Self {
        self.position = Position::Before;
        self
    }

    /// Places the column after its anchor.
    #[must_use]
    pub fn after(mut self) -> Self {
        self.position = Position::After;
        self
    }

    /// Sets the position.
    #[must_use]
    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as an identity column.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Sets the default/backfill expression.
    #[must_use]
    pub fn default_expression(mut self, expr: impl Into<String>) -> Self {
        self.default_expression = Some(expr.into());
        self
    }

    /// Builds the descriptor that goes into the planned column list.
    #[must_use]
    pub fn to_descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            name: self.name.clone(),
            declared_type: self.declared_type.clone(),
            nullable: self.nullable,
            identity: self.identity,
            default_expression: self.default_expression.clone(),
            origin: ColumnOrigin::Inserted,
        }
    }
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    /// Schema name, e.g. `dbo`.
    pub schema: String,
    /// Table name.
    pub name: String,
}

impl TableName {
    /// Creates a table name.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.table`, or a bare `table` in the `dbo` schema.
    ///
    /// Either part may be bracket-quoted; dots inside brackets belong to the
    /// name and `]]` stands for a literal `]`.
    pub fn parse(qualified: &str) -> Result<Self> {
        let invalid = || ReorderError::Config(format!("invalid table name '{qualified}'"));

        let parts = split_qualified(qualified).ok_or_else(invalid)?;
        let (schema, name) = match parts.as_slice() {
            [name] => ("dbo".to_string(), name.clone()),
            [schema, name] => (schema.clone(), name.clone()),
            _ => return Err(invalid()),
        };

        if schema.is_empty() || name.is_empty() {
            return Err(invalid());
        }
        Ok(Self { schema, name })
    }

    /// Returns a table in the same schema with `suffix` appended to the name.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            schema: self.schema.clone(),
            name: format!("{}{}", self.name, suffix),
        }
    }
}

/// Splits a dotted name into its parts, unquoting bracketed parts.
///
/// Returns `None` for an unterminated bracket or text after a closing one.
fn split_qualified(qualified: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut closed = false;
    let mut chars = qualified.trim().chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            if c != ']' {
                current.push(c);
            } else if chars.peek() == Some(&']') {
                chars.next();
                current.push(']');
            } else {
                quoted = false;
                closed = true;
            }
            continue;
        }

        match c {
            '.' => {
                let part = std::mem::take(&mut current);
                parts.push(if closed { part } else { part.trim().to_string() });
                closed = false;
            }
            '[' if !closed && current.trim().is_empty() => {
                current.clear();
                quoted = true;
            }
            c if closed && c.is_whitespace() => {}
            _ if closed => return None,
            _ => current.push(c),
        }
    }

    if quoted {
        return None;
    }
    parts.push(if closed { current } else { current.trim().to_string() });
    Some(parts)
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parse() {
        assert_eq!("before".parse::<Position>().unwrap(), Position::Before);
        assert_eq!("AFTER".parse::<Position>().unwrap(), Position::After);
        assert_eq!(" After ".parse::<Position>().unwrap(), Position::After);
    }

    #[test]
    fn test_position_parse_invalid() {
        let err = "between".parse::<Position>().unwrap_err();
        assert!(matches!(err, ReorderError::InvalidPosition(ref p) if p == "between"));
    }

    #[test]
    fn test_insertion_to_descriptor() {
        let col = InsertionRequest::new("CreatedAt", "DATETIME2(3)", "Id")
            .not_null()
            .default_expression("SYSUTCDATETIME()")
            .to_descriptor();

        assert_eq!(col.name, "CreatedAt");
        assert_eq!(col.origin, ColumnOrigin::Inserted);
        assert!(!col.nullable);
        assert!(!col.identity);
        assert_eq!(col.default_expression.as_deref(), Some("SYSUTCDATETIME()"));
    }

    #[test]
    fn test_has_name_ignores_case() {
        let col = ColumnDescriptor::existing("CustomerId", "INT");
        assert!(col.has_name("customerid"));
        assert!(col.has_name("CUSTOMERID"));
        assert!(!col.has_name("Customer"));
    }

    #[test]
    fn test_names_match_folds_unicode() {
        assert!(names_match("Über", "üBER"));
        assert!(names_match("ÄPFEL", "äpfel"));
        assert!(!names_match("Über", "Uber"));
    }

    #[test]
    fn test_table_name_parse() {
        assert_eq!(
            TableName::parse("sales.Orders").unwrap(),
            TableName::new("sales", "Orders")
        );
        assert_eq!(
            TableName::parse("[sales].[Order Lines]").unwrap(),
            TableName::new("sales", "Order Lines")
        );
        assert_eq!(
            TableName::parse("Orders").unwrap(),
            TableName::new("dbo", "Orders")
        );
        assert!(TableName::parse("sales.").is_err());
    }

    #[test]
    fn test_table_name_parse_bracketed_dots() {
        assert_eq!(
            TableName::parse("[my.schema].[T]").unwrap(),
            TableName::new("my.schema", "T")
        );
        assert_eq!(
            TableName::parse("[odd]]name]").unwrap(),
            TableName::new("dbo", "odd]name")
        );
        assert_eq!(
            TableName::parse(" [sales] . Orders ").unwrap(),
            TableName::new("sales", "Orders")
        );
        assert!(TableName::parse("[sales.Orders").is_err());
        assert!(TableName::parse("[sales]x.Orders").is_err());
        assert!(TableName::parse("db.sales.Orders").is_err());
    }

    #[test]
    fn test_table_name_with_suffix() {
        let tmp = TableName::new("dbo", "Orders").with_suffix("_TmpReorder");
        assert_eq!(tmp, TableName::new("dbo", "Orders_TmpReorder"));
        assert_eq!(tmp.to_string(), "dbo.Orders_TmpReorder");
    }
}
