//! Error types for table rebuilds.

use crate::rebuild::RebuildStep;
use crate::schema::TableName;
use crate::session::SessionError;

/// Errors that can occur while planning or executing a rebuild.
#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    /// The table does not exist or is not visible to the session.
    #[error("Table [{schema}].[{table}] not found or has no visible columns")]
    NotFound {
        /// Schema name.
        schema: String,
        /// Table name.
        table: String,
    },

    /// An insertion references a column that is not in the working list.
    #[error("Anchor column '{anchor}' for new column '{column}' not found")]
    AnchorNotFound {
        /// The column being inserted.
        column: String,
        /// The anchor that could not be resolved.
        anchor: String,
    },

    /// An insertion position is neither `before` nor `after`.
    #[error("Invalid position '{0}': expected 'before' or 'after'")]
    InvalidPosition(String),

    /// An inserted column name collides with a column already in the list.
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    /// The planned column list and the insertion requests disagree.
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// A generated statement failed on the server.
    #[error(
        "{step} failed for {table} ({}): {source}\n  statement: {statement}",
        .step.partial_state()
    )]
    Execution {
        /// The table being rebuilt.
        table: TableName,
        /// The step that failed.
        step: RebuildStep,
        /// The statement text that was sent.
        statement: String,
        /// The underlying session error.
        #[source]
        source: SessionError,
    },

    /// The connection could not be established.
    #[error("Connection error: {0}")]
    Connection(#[source] SessionError),

    /// Invalid connection settings or rebuild options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (reading column files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Column file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReorderError {
    /// Returns the rebuild step that failed, for execution errors.
    #[must_use]
    pub fn step(&self) -> Option<RebuildStep> {
        match self {
            Self::Execution { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Returns the table a failed statement belonged to, for execution errors.
    #[must_use]
    pub fn table(&self) -> Option<&TableName> {
        match self {
            Self::Execution { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Returns true for errors raised while planning, before any SQL ran.
    #[must_use]
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::AnchorNotFound { .. }
                | Self::InvalidPosition(_)
                | Self::DuplicateColumn(_)
                | Self::InternalConsistency(_)
        )
    }
}

/// Result type for rebuild operations.
pub type Result<T> = std::result::Result<T, ReorderError>;
