//! Reading a table's columns from the system catalog.

use tracing::debug;

use crate::dialect::RebuildDialect;
use crate::error::{ReorderError, Result};
use crate::rebuild::RebuildStep;
use crate::schema::{ColumnDescriptor, ColumnOrigin, TableName};
use crate::session::{Row, Session};

/// Reads the columns of `table` in physical order.
///
/// Every column comes back with its type rebuilt by the dialect. Fails with
/// [`ReorderError::NotFound`] when the query returns no rows.
pub async fn read_columns<S, D>(
    session: &mut S,
    dialect: &D,
    table: &TableName,
) -> Result<Vec<ColumnDescriptor>>
where
    S: Session + ?Sized,
    D: RebuildDialect + ?Sized,
{
    let sql = dialect.column_metadata_sql();
    let rows = session
        .query(sql, &[table.schema.as_str(), table.name.as_str()])
        .await
        .map_err(|source| ReorderError::Execution {
            table: table.clone(),
            step: RebuildStep::ReadMetadata,
            statement: sql.trim().to_string(),
            source,
        })?;

    if rows.is_empty() {
        return Err(ReorderError::NotFound {
            schema: table.schema.clone(),
            table: table.name.clone(),
        });
    }

    let columns = rows
        .iter()
        .map(|row| column_from_row(dialect, row))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        table = %table,
        count = columns.len(),
        "Loaded columns"
    );
    Ok(columns)
}

fn column_from_row<D>(dialect: &D, row: &Row) -> Result<ColumnDescriptor>
where
    D: RebuildDialect + ?Sized,
{
    let name = row
        .get_str("column_name")
        .ok_or_else(|| ReorderError::InternalConsistency("catalog row without column_name".into()))?;
    let type_name = row.get_str("data_type").ok_or_else(|| {
        ReorderError::InternalConsistency(format!("catalog row for '{name}' without data_type"))
    })?;

    let missing = |field: &str| {
        ReorderError::InternalConsistency(format!(
            "catalog row for '{name}' has no usable {field}"
        ))
    };
    let int = |field: &str| {
        row.get_i64(field)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| missing(field))
    };
    let flag = |field: &str| row.get_bool(field).ok_or_else(|| missing(field));

    Ok(ColumnDescriptor {
        name: name.to_string(),
        declared_type: dialect.format_type(
            type_name,
            int("max_length")?,
            int("precision")?,
            int("scale")?,
        ),
        nullable: flag("is_nullable")?,
        identity: flag("is_identity")?,
        default_expression: row.get_str("default_definition").map(str::to_string),
        origin: ColumnOrigin::Existing,
    })
}
