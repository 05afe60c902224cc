//! oxide-reorder CLI
//!
//! Command-line tool for rebuilding SQL Server tables with a new column order.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_reorder::config::{DEFAULT_BACKUP_SUFFIX, DEFAULT_PORT, DEFAULT_TEMP_SUFFIX};
use oxide_reorder::prelude::*;

/// Rebuild SQL Server tables to insert columns at any position.
#[derive(Parser)]
#[command(name = "oxide-reorder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server host name.
    #[arg(long, env = "MSSQL_HOST", default_value = "localhost")]
    host: String,

    /// Server port.
    #[arg(long, env = "MSSQL_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database name.
    #[arg(short, long, env = "MSSQL_DATABASE")]
    database: Option<String>,

    /// SQL Server login; integrated authentication is used when omitted.
    #[arg(short, long, env = "MSSQL_USER")]
    user: Option<String>,

    /// Password for the SQL Server login.
    #[arg(long, env = "MSSQL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// ADO.NET connection string; overrides the other connection options.
    #[arg(long, env = "MSSQL_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Require an encrypted connection.
    #[arg(long)]
    encrypt: bool,

    /// Accept any server certificate (with --encrypt).
    #[arg(long)]
    trust_server_cert: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a table's columns in physical order.
    Columns {
        /// Table name (`schema.table`, or `table` in dbo).
        table: String,
    },

    /// Print the rebuild statements without executing them.
    Plan {
        #[command(flatten)]
        rebuild: RebuildArgs,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rebuild a table with new columns at the requested positions.
    Rebuild {
        #[command(flatten)]
        rebuild: RebuildArgs,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct RebuildArgs {
    /// Table name (`schema.table`, or `table` in dbo).
    table: String,

    /// JSON file listing the columns to insert.
    #[arg(short, long)]
    columns: Option<PathBuf>,

    /// Suffix for the temporary table.
    #[arg(long, default_value = DEFAULT_TEMP_SUFFIX)]
    temp_suffix: String,

    /// How the rebuilt table replaces the original.
    #[arg(long, value_enum, default_value_t = SwapStrategy::DropThenRename)]
    swap: SwapStrategy,

    /// Suffix for the original table under the rename-then-drop strategy.
    #[arg(long, default_value = DEFAULT_BACKUP_SUFFIX)]
    backup_suffix: String,
}

impl RebuildArgs {
    fn options(&self, dry_run: bool) -> RebuildOptions {
        RebuildOptions {
            temp_suffix: self.temp_suffix.clone(),
            backup_suffix: self.backup_suffix.clone(),
            swap: self.swap,
            dry_run,
        }
    }

    fn insertions(&self) -> anyhow::Result<Vec<InsertionRequest>> {
        match &self.columns {
            Some(path) => Ok(ColumnFile::load(path)
                .with_context(|| format!("reading column file {}", path.display()))?
                .insertion_requests()?),
            None => Ok(Vec::new()),
        }
    }
}

impl Cli {
    fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        if let Some(connection_string) = &self.connection_string {
            return Ok(ConnectionConfig::from_ado_string(connection_string));
        }

        let Some(database) = &self.database else {
            bail!("--database (or MSSQL_DATABASE) is required without a connection string");
        };

        let mut config = ConnectionConfig::new(&self.host, database).port(self.port);
        if let Some(user) = &self.user {
            config = config.sql_login(user, self.password.clone().unwrap_or_default());
        }
        if self.encrypt {
            config = config.encrypt(self.trust_server_cert);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.connection_config()?;
    let mut session = MssqlSession::connect(&config).await?;
    let dialect = MssqlDialect::new();

    match &cli.command {
        Commands::Columns { table } => {
            let table = TableName::parse(table)?;
            let columns = read_columns(&mut session, &dialect, &table).await?;

            println!("\nColumns of {}:", table);
            println!("{:-<60}", "");
            for (ordinal, column) in columns.iter().enumerate() {
                println!(
                    " {:>3}  {}",
                    ordinal + 1,
                    dialect.column_definition(column)
                );
            }
            println!();
        }

        Commands::Plan { rebuild, json } => {
            let table = TableName::parse(&rebuild.table)?;
            let insertions = rebuild.insertions()?;
            let rebuilder = TableRebuilder::new(dialect).options(rebuild.options(true));

            let plan = rebuilder.plan(&mut session, &table, &insertions).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("{}", plan.to_sql_script());
            }
        }

        Commands::Rebuild { rebuild, dry_run } => {
            let table = TableName::parse(&rebuild.table)?;
            let insertions = rebuild.insertions()?;
            let rebuilder = TableRebuilder::new(dialect).options(rebuild.options(*dry_run));

            if *dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }

            let report = rebuilder.rebuild(&mut session, &table, &insertions).await?;
            if *dry_run {
                println!("{}", report.plan.to_sql_script());
            } else {
                info!(
                    "Rebuilt {} with {} columns ({} rows copied).",
                    table,
                    report.plan.columns.len(),
                    report.rows_copied.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
