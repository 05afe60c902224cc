//! Table rebuild orchestration.
//!
//! A rebuild reads the current columns, plans the new order, and then runs
//! four statements against one session: create the temporary table, copy the
//! rows, and swap the temporary table in for the original. Nothing is retried
//! and nothing is rolled back; a failure reports the step it happened in so
//! the caller knows what was already changed.
//!
//! With [`SwapStrategy::DropThenRename`] the original table is gone between
//! the DROP and the rename. If the process dies in that window the data only
//! exists in the temporary table. [`SwapStrategy::RenameThenDrop`] keeps the
//! original under a backup name until the rebuilt table is in place.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::read_columns;
use crate::config::{RebuildOptions, SwapStrategy};
use crate::dialect::RebuildDialect;
use crate::error::{ReorderError, Result};
use crate::planner::plan_columns;
use crate::schema::{ColumnDescriptor, InsertionRequest, TableName};
use crate::session::Session;

/// One step of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStep {
    /// Read the column metadata.
    ReadMetadata,
    /// Create the temporary table.
    CreateTemp,
    /// Copy rows into the temporary table.
    CopyRows,
    /// Drop the original table.
    DropOriginal,
    /// Rename the original table to its backup name.
    RenameOriginal,
    /// Rename the temporary table to the original name.
    RenameTemp,
    /// Drop the renamed original.
    DropBackup,
}

impl RebuildStep {
    /// Describes the database state when this step fails.
    #[must_use]
    pub fn partial_state(&self) -> &'static str {
        match self {
            Self::ReadMetadata | Self::CreateTemp => "nothing was changed",
            Self::CopyRows | Self::DropOriginal | Self::RenameOriginal => {
                "original table unchanged, temporary table left behind"
            }
            Self::RenameTemp => {
                "original table no longer under its name, data only in the temporary table \
                 (or the backup); rename manually"
            }
            Self::DropBackup => "rebuilt table in place, backup of the original left behind",
        }
    }

    /// Returns true if failing here leaves the table name missing.
    #[must_use]
    pub fn leaves_table_missing(&self) -> bool {
        matches!(self, Self::RenameTemp)
    }
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadMetadata => "read metadata",
            Self::CreateTemp => "create temporary table",
            Self::CopyRows => "copy rows",
            Self::DropOriginal => "drop original table",
            Self::RenameOriginal => "rename original table",
            Self::RenameTemp => "rename temporary table",
            Self::DropBackup => "drop backup table",
        };
        f.write_str(name)
    }
}

/// A statement and the step it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStatement {
    /// The step.
    pub step: RebuildStep,
    /// SQL text; the copy step may be a multi-statement batch.
    pub sql: String,
}

/// Everything a rebuild will do, computed before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildPlan {
    /// The table being rebuilt.
    pub table: TableName,
    /// The temporary table.
    pub temp_table: TableName,
    /// Planned columns in their new physical order.
    pub columns: Vec<ColumnDescriptor>,
    /// Statements in execution order.
    pub statements: Vec<PlannedStatement>,
}

impl RebuildPlan {
    /// Returns the statement for a step, if the plan has one.
    #[must_use]
    pub fn statement(&self, step: RebuildStep) -> Option<&str> {
        self.statements
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.sql.as_str())
    }

    /// Renders the plan as a script, one statement per step.
    #[must_use]
    pub fn to_sql_script(&self) -> String {
        self.statements
            .iter()
            .map(|s| format!("-- {}\n{};\n", s.step, s.sql))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// The plan that was run.
    pub plan: RebuildPlan,
    /// Steps that completed, in order. Empty for dry runs.
    pub executed: Vec<RebuildStep>,
    /// Rows reported by the copy, if it ran.
    pub rows_copied: Option<u64>,
}

/// Rebuilds tables to a new column order.
pub struct TableRebuilder<D: RebuildDialect> {
    dialect: D,
    options: RebuildOptions,
}

impl<D: RebuildDialect> TableRebuilder<D> {
    /// Creates a rebuilder with default options.
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            options: RebuildOptions::default(),
        }
    }

    /// Sets the rebuild options.
    #[must_use]
    pub fn options(mut self, options: RebuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables dry-run mode (plan only, nothing is executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the options.
    #[must_use]
    pub fn rebuild_options(&self) -> &RebuildOptions {
        &self.options
    }

    /// Builds a plan from already-read columns. Does no IO.
    pub fn build_plan(
        &self,
        table: &TableName,
        existing: &[ColumnDescriptor],
        insertions: &[InsertionRequest],
    ) -> Result<RebuildPlan> {
        self.options.validate()?;

        let columns = plan_columns(existing, insertions)?;
        let temp_table = table.with_suffix(&self.options.temp_suffix);

        let mut statements = vec![PlannedStatement {
            step: RebuildStep::CreateTemp,
            sql: self.dialect.create_table(&temp_table, &columns),
        }];

        let copy = self
            .dialect
            .copy_statements(table, &temp_table, &columns, insertions)?;
        statements.push(PlannedStatement {
            step: RebuildStep::CopyRows,
            sql: copy.join(";\n"),
        });

        match self.options.swap {
            SwapStrategy::DropThenRename => {
                statements.push(PlannedStatement {
                    step: RebuildStep::DropOriginal,
                    sql: self.dialect.drop_table(table),
                });
                statements.push(PlannedStatement {
                    step: RebuildStep::RenameTemp,
                    sql: self.dialect.rename_table(&temp_table, &table.name),
                });
            }
            SwapStrategy::RenameThenDrop => {
                let backup = table.with_suffix(&self.options.backup_suffix);
                statements.push(PlannedStatement {
                    step: RebuildStep::RenameOriginal,
                    sql: self.dialect.rename_table(table, &backup.name),
                });
                statements.push(PlannedStatement {
                    step: RebuildStep::RenameTemp,
                    sql: self.dialect.rename_table(&temp_table, &table.name),
                });
                statements.push(PlannedStatement {
                    step: RebuildStep::DropBackup,
                    sql: self.dialect.drop_table(&backup),
                });
            }
        }

        Ok(RebuildPlan {
            table: table.clone(),
            temp_table,
            columns,
            statements,
        })
    }

    /// Reads the table's columns and plans the rebuild without executing it.
    pub async fn plan<S>(
        &self,
        session: &mut S,
        table: &TableName,
        insertions: &[InsertionRequest],
    ) -> Result<RebuildPlan>
    where
        S: Session + ?Sized,
    {
        self.options.validate()?;
        let existing = read_columns(session, &self.dialect, table).await?;
        self.build_plan(table, &existing, insertions)
    }

    /// Rebuilds `table` with `insertions` placed at their anchors.
    pub async fn rebuild<S>(
        &self,
        session: &mut S,
        table: &TableName,
        insertions: &[InsertionRequest],
    ) -> Result<RebuildReport>
    where
        S: Session + ?Sized,
    {
        info!(
            table = %table,
            insertions = insertions.len(),
            dialect = self.dialect.name(),
            "Planning rebuild"
        );
        let plan = self.plan(session, table, insertions).await?;

        if self.options.dry_run {
            info!(table = %table, "Dry run, nothing executed");
            return Ok(RebuildReport {
                plan,
                executed: Vec::new(),
                rows_copied: None,
            });
        }

        let mut executed = Vec::with_capacity(plan.statements.len());
        let mut rows_copied = None;

        for statement in &plan.statements {
            if statement.step == RebuildStep::DropOriginal {
                warn!(
                    table = %table,
                    temp_table = %plan.temp_table,
                    "Dropping original table; until the rename completes the data exists only \
                     in the temporary table"
                );
            }

            info!(table = %table, step = %statement.step, "Running rebuild step");
            debug!(sql = %statement.sql, "Executing SQL");

            let affected = session.execute(&statement.sql).await.map_err(|source| {
                ReorderError::Execution {
                    table: table.clone(),
                    step: statement.step,
                    statement: statement.sql.clone(),
                    source,
                }
            })?;

            if statement.step == RebuildStep::CopyRows {
                info!(table = %table, rows = affected, "Rows copied");
                rows_copied = Some(affected);
            }
            executed.push(statement.step);
        }

        info!(table = %table, "Rebuild completed successfully");

        Ok(RebuildReport {
            plan,
            executed,
            rows_copied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MssqlDialect;

    fn users() -> TableName {
        TableName::new("dbo", "Users")
    }

    fn existing() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::existing("Id", "INT").not_null().identity(),
            ColumnDescriptor::existing("Name", "VARCHAR(50)"),
        ]
    }

    fn steps(plan: &RebuildPlan) -> Vec<RebuildStep> {
        plan.statements.iter().map(|s| s.step).collect()
    }

    #[test]
    fn test_drop_then_rename_plan() {
        let rebuilder = TableRebuilder::new(MssqlDialect::new());
        let plan = rebuilder.build_plan(&users(), &existing(), &[]).unwrap();

        assert_eq!(plan.temp_table, TableName::new("dbo", "Users_TmpReorder"));
        assert_eq!(
            steps(&plan),
            vec![
                RebuildStep::CreateTemp,
                RebuildStep::CopyRows,
                RebuildStep::DropOriginal,
                RebuildStep::RenameTemp,
            ]
        );
        assert_eq!(
            plan.statement(RebuildStep::DropOriginal),
            Some("DROP TABLE [dbo].[Users]")
        );
        assert_eq!(
            plan.statement(RebuildStep::RenameTemp),
            Some("EXEC sp_rename N'[dbo].[Users_TmpReorder]', N'Users', 'OBJECT'")
        );
    }

    #[test]
    fn test_rename_then_drop_plan() {
        let options = RebuildOptions {
            swap: SwapStrategy::RenameThenDrop,
            ..RebuildOptions::default()
        };
        let rebuilder = TableRebuilder::new(MssqlDialect::new()).options(options);
        let plan = rebuilder.build_plan(&users(), &existing(), &[]).unwrap();

        assert_eq!(
            steps(&plan),
            vec![
                RebuildStep::CreateTemp,
                RebuildStep::CopyRows,
                RebuildStep::RenameOriginal,
                RebuildStep::RenameTemp,
                RebuildStep::DropBackup,
            ]
        );
        assert_eq!(
            plan.statement(RebuildStep::RenameOriginal),
            Some("EXEC sp_rename N'[dbo].[Users]', N'Users_OldReorder', 'OBJECT'")
        );
        assert_eq!(
            plan.statement(RebuildStep::DropBackup),
            Some("DROP TABLE [dbo].[Users_OldReorder]")
        );
    }

    #[test]
    fn test_copy_batch_is_bracketed_for_identity() {
        let rebuilder = TableRebuilder::new(MssqlDialect::new());
        let plan = rebuilder.build_plan(&users(), &existing(), &[]).unwrap();

        let copy = plan.statement(RebuildStep::CopyRows).unwrap();
        assert!(copy.starts_with("SET IDENTITY_INSERT [dbo].[Users_TmpReorder] ON;\n"));
        assert!(copy.ends_with(";\nSET IDENTITY_INSERT [dbo].[Users_TmpReorder] OFF"));
    }

    #[test]
    fn test_custom_temp_suffix() {
        let options = RebuildOptions {
            temp_suffix: "__new".to_string(),
            ..RebuildOptions::default()
        };
        let plan = TableRebuilder::new(MssqlDialect::new())
            .options(options)
            .build_plan(&users(), &existing(), &[])
            .unwrap();

        assert_eq!(plan.temp_table.name, "Users__new");
        assert!(plan
            .statement(RebuildStep::CreateTemp)
            .unwrap()
            .starts_with("CREATE TABLE [dbo].[Users__new] ("));
    }

    #[test]
    fn test_plan_rendering_is_stable() {
        let insertions = vec![InsertionRequest::new("Email", "NVARCHAR(320)", "Name").before()];
        let rebuilder = TableRebuilder::new(MssqlDialect::new());

        let first = rebuilder
            .build_plan(&users(), &existing(), &insertions)
            .unwrap();
        let second = rebuilder
            .build_plan(&users(), &existing(), &insertions)
            .unwrap();

        assert_eq!(first.to_sql_script(), second.to_sql_script());
    }

    #[test]
    fn test_planning_error_builds_nothing() {
        let insertions = vec![InsertionRequest::new("Email", "NVARCHAR(320)", "Missing")];
        let err = TableRebuilder::new(MssqlDialect::new())
            .build_plan(&users(), &existing(), &insertions)
            .unwrap_err();

        assert!(err.is_planning_error());
        assert_eq!(err.step(), None);
    }

    #[test]
    fn test_sql_script() {
        let plan = TableRebuilder::new(MssqlDialect::new())
            .build_plan(&users(), &existing(), &[])
            .unwrap();
        let script = plan.to_sql_script();

        assert!(script.starts_with("-- create temporary table\nCREATE TABLE"));
        assert!(script.contains("-- drop original table\nDROP TABLE [dbo].[Users];\n"));
    }

    #[test]
    fn test_step_partial_state() {
        assert!(RebuildStep::RenameTemp.leaves_table_missing());
        assert!(!RebuildStep::DropOriginal.leaves_table_missing());
        assert_eq!(RebuildStep::CreateTemp.partial_state(), "nothing was changed");
        assert_eq!(RebuildStep::CopyRows.to_string(), "copy rows");
    }
}
