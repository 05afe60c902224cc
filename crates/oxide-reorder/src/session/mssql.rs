//! SQL Server session over Tiberius.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::{AuthMode, ConnectionConfig};
use crate::error::{ReorderError, Result};

use super::{Row, Session, SessionError, SqlValue};

/// A single SQL Server connection.
pub struct MssqlSession {
    client: Client<Compat<TcpStream>>,
}

impl MssqlSession {
    /// Connects using the given settings.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let tiberius_config = build_config(config)?;

        let client = match open(tiberius_config.clone()).await {
            // Azure SQL may redirect the login to another node.
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!(%host, port, "Following MSSQL login redirect");
                let mut redirected = tiberius_config;
                redirected.host(&host);
                redirected.port(port);
                open(redirected).await
            }
            other => other,
        }
        .map_err(|e| ReorderError::Connection(Box::new(e)))?;

        info!(
            host = %config.host,
            database = %config.database,
            "Connected to MSSQL"
        );

        Ok(Self { client })
    }
}

fn build_config(settings: &ConnectionConfig) -> Result<Config> {
    if let Some(connection_string) = &settings.connection_string {
        return Config::from_ado_string(connection_string)
            .map_err(|e| ReorderError::Config(format!("invalid connection string: {e}")));
    }

    let mut config = Config::new();
    config.host(&settings.host);
    config.port(settings.port);
    config.database(&settings.database);
    config.application_name(&settings.application_name);

    match &settings.auth {
        AuthMode::SqlServer { user, password } => {
            config.authentication(AuthMethod::sql_server(user, password));
        }
        #[cfg(any(windows, feature = "integrated-auth"))]
        AuthMode::Integrated => {
            config.authentication(AuthMethod::Integrated);
        }
        #[cfg(not(any(windows, feature = "integrated-auth")))]
        AuthMode::Integrated => {
            return Err(ReorderError::Config(
                "integrated authentication requires Windows or the `integrated-auth` feature"
                    .into(),
            ));
        }
    }

    if settings.encrypt {
        if settings.trust_server_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    Ok(config)
}

async fn open(config: Config) -> tiberius::Result<Client<Compat<TcpStream>>> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

/// Maps a Tiberius cell to a [`SqlValue`].
///
/// Only the shapes catalog queries return are kept; other types read as NULL.
fn to_sql_value(data: ColumnData<'static>) -> SqlValue {
    match data {
        ColumnData::U8(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I16(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I32(Some(v)) => SqlValue::Int(i64::from(v)),
        ColumnData::I64(Some(v)) => SqlValue::Int(v),
        ColumnData::Bit(Some(v)) => SqlValue::Bool(v),
        ColumnData::String(Some(v)) => SqlValue::Text(v.into_owned()),
        _ => SqlValue::Null,
    }
}

#[async_trait]
impl Session for MssqlSession {
    async fn execute(&mut self, sql: &str) -> std::result::Result<u64, SessionError> {
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> std::result::Result<Vec<Row>, SessionError> {
        let mut query = Query::new(sql);
        for param in params {
            query.bind(param.to_string());
        }

        let stream = query.query(&mut self.client).await?;
        let rows = stream.into_first_result().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let names: Vec<String> = row
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect();
                let mut out = Row::new();
                for (name, data) in names.into_iter().zip(row) {
                    out.push(name, to_sql_value(data));
                }
                out
            })
            .collect())
    }
}
