//! Connection settings, rebuild options and column files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReorderError, Result};
use crate::schema::{names_match, InsertionRequest, Position};

/// Suffix appended to the table name for the rebuilt copy.
pub const DEFAULT_TEMP_SUFFIX: &str = "_TmpReorder";

/// Suffix the original table is renamed to under [`SwapStrategy::RenameThenDrop`].
pub const DEFAULT_BACKUP_SUFFIX: &str = "_OldReorder";

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// How the session authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Windows integrated / Kerberos authentication (trusted connection).
    Integrated,
    /// SQL Server login.
    SqlServer {
        /// Login name.
        user: String,
        /// Password.
        password: String,
    },
}

/// Connection settings for SQL Server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Authentication mode.
    pub auth: AuthMode,
    /// Whether to require TLS.
    pub encrypt: bool,
    /// Whether to accept any server certificate.
    pub trust_server_cert: bool,
    /// Application name reported to the server.
    pub application_name: String,
    /// ADO.NET connection string; takes precedence over the fields above.
    pub connection_string: Option<String>,
}

impl ConnectionConfig {
    /// Creates settings for `database` on `host` with integrated auth.
    #[must_use]
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            database: database.into(),
            auth: AuthMode::Integrated,
            encrypt: false,
            trust_server_cert: false,
            application_name: "oxide-reorder".to_string(),
            connection_string: None,
        }
    }

    /// Creates settings from an ADO.NET connection string.
    #[must_use]
    pub fn from_ado_string(connection_string: impl Into<String>) -> Self {
        let mut config = Self::new("", "");
        config.connection_string = Some(connection_string.into());
        config
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Uses a SQL Server login.
    #[must_use]
    pub fn sql_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMode::SqlServer {
            user: user.into(),
            password: password.into(),
        };
        self
    }

    /// Requires TLS, optionally trusting any server certificate.
    #[must_use]
    pub fn encrypt(mut self, trust_server_cert: bool) -> Self {
        self.encrypt = true;
        self.trust_server_cert = trust_server_cert;
        self
    }

    /// Checks that the settings can produce a connection.
    pub fn validate(&self) -> Result<()> {
        if let Some(connection_string) = &self.connection_string {
            if connection_string.trim().is_empty() {
                return Err(ReorderError::Config("connection string is empty".into()));
            }
            return Ok(());
        }

        if self.host.trim().is_empty() {
            return Err(ReorderError::Config("host is required".into()));
        }
        if self.database.trim().is_empty() {
            return Err(ReorderError::Config("database is required".into()));
        }
        if let AuthMode::SqlServer { user, .. } = &self.auth {
            if user.trim().is_empty() {
                return Err(ReorderError::Config(
                    "user is required for SQL Server authentication".into(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.auth {
            AuthMode::Integrated => "integrated".to_string(),
            AuthMode::SqlServer { user, .. } => format!("sql_server({user})"),
        };
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("auth", &auth)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("application_name", &self.application_name)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// How the rebuilt table replaces the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SwapStrategy {
    /// Drop the original, then rename the rebuilt table into place.
    ///
    /// Between the two statements the table name does not exist.
    #[default]
    DropThenRename,
    /// Rename the original out of the way, rename the rebuilt table into
    /// place, then drop the renamed original.
    RenameThenDrop,
}

/// Options for one rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildOptions {
    /// Suffix for the temporary table name.
    pub temp_suffix: String,
    /// Suffix for the renamed original under [`SwapStrategy::RenameThenDrop`].
    pub backup_suffix: String,
    /// Swap strategy.
    pub swap: SwapStrategy,
    /// Plan only; execute nothing.
    pub dry_run: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            swap: SwapStrategy::default(),
            dry_run: false,
        }
    }
}

impl RebuildOptions {
    /// Checks the suffixes.
    pub fn validate(&self) -> Result<()> {
        if self.temp_suffix.is_empty() {
            return Err(ReorderError::Config("temp suffix must not be empty".into()));
        }
        if self.swap == SwapStrategy::RenameThenDrop {
            if self.backup_suffix.is_empty() {
                return Err(ReorderError::Config(
                    "backup suffix must not be empty".into(),
                ));
            }
            if names_match(&self.backup_suffix, &self.temp_suffix) {
                return Err(ReorderError::Config(
                    "backup suffix must differ from temp suffix".into(),
                ));
            }
        }
        Ok(())
    }
}

fn default_nullable() -> bool {
    true
}

/// One new column as written in a column file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Fully parameterized type.
    #[serde(rename = "type")]
    pub declared_type: String,
    /// Whether the column allows NULL values (default true).
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column is an identity column (default false).
    #[serde(default)]
    pub identity: bool,
    /// Default/backfill expression.
    #[serde(default)]
    pub default: Option<String>,
    /// Anchor column name.
    pub anchor: String,
    /// `before` or `after`.
    pub position: String,
}

impl ColumnSpec {
    /// Converts to an insertion request, validating the position.
    pub fn to_request(&self) -> Result<InsertionRequest> {
        let position: Position = self.position.parse()?;
        Ok(InsertionRequest {
            name: self.name.clone(),
            declared_type: self.declared_type.clone(),
            nullable: self.nullable,
            identity: self.identity,
            default_expression: self.default.clone(),
            anchor: self.anchor.clone(),
            position,
        })
    }
}

/// A JSON file listing the columns to insert, in application order.
///
/// ```json
/// {
///   "columns": [
///     { "name": "CreatedAt", "type": "DATETIME2(3)", "default": "SYSUTCDATETIME()",
///       "anchor": "Id", "position": "after" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFile {
    /// Columns to insert.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl ColumnFile {
    /// Parses a column file from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a column file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Converts every column to an insertion request, keeping file order.
    pub fn insertion_requests(&self) -> Result<Vec<InsertionRequest>> {
        self.columns.iter().map(ColumnSpec::to_request).collect()
    }
}
