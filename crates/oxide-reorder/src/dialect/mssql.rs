//! SQL Server dialect for table rebuilds.
//!
//! SQL Server fixes column order at creation and `ALTER TABLE ... ADD` only
//! appends, so placing a column anywhere else needs the "table recreation"
//! strategy: create a new table, copy data, drop the old table, rename the
//! new table.

use crate::schema::TableName;

use super::RebuildDialect;

/// `sys.columns.max_length` value for `(MAX)` types.
pub const MAX_LENGTH_SENTINEL: i32 = -1;

/// Columns of a table in physical order, with type facts and default text.
///
/// `@P1` is the schema name and `@P2` the table name.
pub const COLUMN_METADATA_SQL: &str = r#"
SELECT
    c.column_id,
    c.name AS column_name,
    t.name AS data_type,
    CAST(c.max_length AS INT) AS max_length,
    CAST(c.precision AS INT) AS precision,
    CAST(c.scale AS INT) AS scale,
    c.is_nullable,
    c.is_identity,
    dc.definition AS default_definition
FROM sys.columns AS c
INNER JOIN sys.tables AS tb ON c.object_id = tb.object_id
INNER JOIN sys.types AS t ON c.user_type_id = t.user_type_id
LEFT JOIN sys.default_constraints AS dc
    ON c.default_object_id = dc.object_id
WHERE SCHEMA_NAME(tb.schema_id) = @P1
  AND tb.name = @P2
ORDER BY c.column_id
"#;

/// Reconstructs a full T-SQL type from `sys.columns` facts.
///
/// Character and binary types get their length (`MAX` for the -1 sentinel;
/// `NCHAR`/`NVARCHAR` lengths are stored in bytes and halved), exact
/// numerics get precision and scale, fractional-second temporals get scale.
/// Everything else is the bare type name.
#[must_use]
pub fn format_type(type_name: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let name = type_name.trim().to_ascii_uppercase();
    match name.as_str() {
        "CHAR" | "NCHAR" | "VARCHAR" | "NVARCHAR" | "BINARY" | "VARBINARY" => {
            if max_length == MAX_LENGTH_SENTINEL {
                format!("{name}(MAX)")
            } else if matches!(name.as_str(), "NCHAR" | "NVARCHAR") {
                format!("{name}({})", max_length / 2)
            } else {
                format!("{name}({max_length})")
            }
        }
        "DECIMAL" | "NUMERIC" => format!("{name}({precision},{scale})"),
        "DATETIME2" | "TIME" | "DATETIMEOFFSET" => format!("{name}({scale})"),
        _ => name,
    }
}

/// SQL Server rebuild dialect.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RebuildDialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn format_type(
        &self,
        type_name: &str,
        max_length: i32,
        precision: i32,
        scale: i32,
    ) -> String {
        format_type(type_name, max_length, precision, scale)
    }

    fn column_metadata_sql(&self) -> &'static str {
        COLUMN_METADATA_SQL
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn identity_keyword(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn exclusive_lock_hint(&self) -> &'static str {
        "WITH (HOLDLOCK TABLOCKX)"
    }

    fn identity_insert(&self, table: &TableName, enabled: bool) -> String {
        format!(
            "SET IDENTITY_INSERT {} {}",
            self.qualified_name(table),
            if enabled { "ON" } else { "OFF" }
        )
    }

    fn rename_table(&self, table: &TableName, new_name: &str) -> String {
        // sp_rename takes the new name unqualified.
        format!(
            "EXEC sp_rename {}, {}, 'OBJECT'",
            self.quote_literal(&self.qualified_name(table)),
            self.quote_literal(new_name)
        )
    }
}
