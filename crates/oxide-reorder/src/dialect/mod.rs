//! Database dialect implementations.
//!
//! A dialect knows how to rebuild a column type from catalog facts and how to
//! render the statements of a rebuild: the temporary table, the copy, and the
//! swap.

mod mssql;

pub use mssql::{format_type, MssqlDialect, COLUMN_METADATA_SQL, MAX_LENGTH_SENTINEL};

use crate::error::{ReorderError, Result};
use crate::schema::{names_match, ColumnDescriptor, ColumnOrigin, InsertionRequest, TableName};

/// Trait for database-specific SQL generation.
pub trait RebuildDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Reconstructs a declarable type from a raw catalog type name and its
    /// length, precision and scale.
    fn format_type(&self, type_name: &str, max_length: i32, precision: i32, scale: i32)
        -> String;

    /// Catalog query returning one row per column of a table, in physical
    /// order. Takes the schema and table names as its two parameters.
    fn column_metadata_sql(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Returns the schema-qualified, quoted table name.
    fn qualified_name(&self, table: &TableName) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(&table.schema),
            self.quote_identifier(&table.name)
        )
    }

    /// Returns the identity keyword for this dialect.
    fn identity_keyword(&self) -> &'static str;

    /// Returns the table hint that locks the copy source exclusively.
    fn exclusive_lock_hint(&self) -> &'static str;

    /// Statement toggling explicit inserts into identity columns.
    fn identity_insert(&self, table: &TableName, enabled: bool) -> String;

    /// Generates SQL for dropping a table.
    fn drop_table(&self, table: &TableName) -> String {
        format!("DROP TABLE {}", self.qualified_name(table))
    }

    /// Generates SQL for renaming a table within its schema.
    fn rename_table(&self, table: &TableName, new_name: &str) -> String;

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            column.declared_type.clone(),
        ];

        if column.identity {
            parts.push(self.identity_keyword().to_string());
        }

        if let Some(default) = &column.default_expression {
            parts.push(format!("DEFAULT {default}"));
        }

        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());

        parts.join(" ")
    }

    /// Generates SQL for CREATE TABLE, columns in the given order.
    fn create_table(&self, table: &TableName, columns: &[ColumnDescriptor]) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.qualified_name(table));
        sql.push_str(" (\n");

        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();
        sql.push_str(&column_defs.join(",\n"));

        sql.push_str("\n)");
        sql
    }

    /// Returns the SELECT-list expression for each planned column.
    ///
    /// Existing columns are selected by name. Inserted columns select their
    /// backfill expression, or NULL, aliased to the column name.
    fn copy_select_list(
        &self,
        planned: &[ColumnDescriptor],
        insertions: &[InsertionRequest],
    ) -> Result<Vec<String>> {
        planned
            .iter()
            .map(|column| match column.origin {
                ColumnOrigin::Existing => Ok(self.quote_identifier(&column.name)),
                ColumnOrigin::Inserted => {
                    let request = insertions
                        .iter()
                        .find(|r| names_match(&r.name, &column.name))
                        .ok_or_else(|| {
                            ReorderError::InternalConsistency(format!(
                                "inserted column '{}' has no matching insertion request",
                                column.name
                            ))
                        })?;
                    let expr = request.default_expression.as_deref().unwrap_or("NULL");
                    Ok(format!("{expr} AS {}", self.quote_identifier(&column.name)))
                }
            })
            .collect()
    }

    /// Generates the statements that copy every row of `source` into `target`.
    ///
    /// When any planned column is an identity column the INSERT is bracketed
    /// by identity-insert toggles. The statements must run on one connection.
    fn copy_statements(
        &self,
        source: &TableName,
        target: &TableName,
        planned: &[ColumnDescriptor],
        insertions: &[InsertionRequest],
    ) -> Result<Vec<String>> {
        let select_list = self.copy_select_list(planned, insertions)?;
        let insert_columns: Vec<String> = planned
            .iter()
            .map(|c| self.quote_identifier(&c.name))
            .collect();

        let insert = format!(
            "INSERT INTO {} ({})\nSELECT {}\nFROM {} {}",
            self.qualified_name(target),
            insert_columns.join(", "),
            select_list.join(", "),
            self.qualified_name(source),
            self.exclusive_lock_hint()
        );

        if planned.iter().any(|c| c.identity) {
            Ok(vec![
                self.identity_insert(target, true),
                insert,
                self.identity_insert(target, false),
            ])
        } else {
            Ok(vec![insert])
        }
    }
}
