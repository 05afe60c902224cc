//! Column reordering for SQL Server tables.
//!
//! SQL Server fixes a table's column order when it is created and
//! `ALTER TABLE ... ADD` can only append. `oxide-reorder` rebuilds a table to
//! place new columns anywhere:
//!
//! - Reads the current columns from the catalog, in physical order
//! - Inserts each new column before or after an anchor column
//! - Creates a temporary table with the new order
//! - Copies every row, backfilling new columns from their default or NULL
//! - Swaps the temporary table in for the original
//!
//! Indexes, foreign keys, constraints other than column defaults, triggers and
//! permissions are not carried over to the rebuilt table.
//!
//! # Architecture
//!
//! - **Catalog** - Reads column metadata through a [`session::Session`]
//! - **Dialect** - Rebuilds type strings and renders DDL/DML
//! - **Planner** - Merges insertions into the existing column order
//! - **Rebuild** - Runs the statements and reports the failing step
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_reorder::prelude::*;
//!
//! let mut session = MssqlSession::connect(&ConnectionConfig::new("localhost", "Sales")).await?;
//!
//! let report = TableRebuilder::new(MssqlDialect::new())
//!     .rebuild(
//!         &mut session,
//!         &TableName::new("dbo", "Users"),
//!         &[InsertionRequest::new("CreatedAt", "DATETIME2(3)", "Id")
//!             .after()
//!             .default_expression("SYSUTCDATETIME()")],
//!     )
//!     .await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the current columns
//! oxide-reorder columns dbo.Users
//!
//! # Print the rebuild script without running it
//! oxide-reorder plan dbo.Users --columns new_columns.json
//!
//! # Rebuild the table
//! oxide-reorder rebuild dbo.Users --columns new_columns.json
//! ```

pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod planner;
pub mod rebuild;
pub mod schema;
pub mod session;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::read_columns;
    pub use crate::config::{
        AuthMode, ColumnFile, ColumnSpec, ConnectionConfig, RebuildOptions, SwapStrategy,
    };
    pub use crate::dialect::{format_type, MssqlDialect, RebuildDialect};
    pub use crate::error::{ReorderError, Result};
    pub use crate::planner::plan_columns;
    pub use crate::rebuild::{
        PlannedStatement, RebuildPlan, RebuildReport, RebuildStep, TableRebuilder,
    };
    pub use crate::schema::{
        names_match, ColumnDescriptor, ColumnOrigin, InsertionRequest, Position, TableName,
    };
    pub use crate::session::{MssqlSession, Row, Session, SessionError, SqlValue};
}
