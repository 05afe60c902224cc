#![allow(dead_code)]

use async_trait::async_trait;

use oxide_reorder::session::{Row, Session, SessionError, SqlValue};

/// In-memory session that serves one catalog result and records statements.
#[derive(Default)]
pub struct ScriptedSession {
    pub catalog: Vec<Row>,
    pub executed: Vec<String>,
    pub queries: Vec<(String, Vec<String>)>,
    /// Fail the statement at this index (0-based) of `execute` calls.
    pub fail_at: Option<usize>,
    pub rows_affected: u64,
}

impl ScriptedSession {
    pub fn with_catalog(catalog: Vec<Row>) -> Self {
        Self {
            catalog,
            rows_affected: 3,
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, sql: &str) -> Result<u64, SessionError> {
        let index = self.executed.len();
        self.executed.push(sql.to_string());
        if self.fail_at == Some(index) {
            return Err(format!("Msg 2714: statement {index} failed").into());
        }
        Ok(self.rows_affected)
    }

    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError> {
        self.queries.push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        Ok(self.catalog.clone())
    }
}

/// A `sys.columns` row as the catalog query returns it.
pub fn catalog_row(name: &str, data_type: &str, max_length: i64) -> CatalogRow {
    CatalogRow {
        row: Row::new()
            .with("column_name", SqlValue::Text(name.into()))
            .with("data_type", SqlValue::Text(data_type.into()))
            .with("max_length", SqlValue::Int(max_length)),
        precision: 0,
        scale: 0,
        nullable: true,
        identity: false,
        default: None,
    }
}

pub struct CatalogRow {
    row: Row,
    precision: i64,
    scale: i64,
    nullable: bool,
    identity: bool,
    default: Option<String>,
}

impl CatalogRow {
    pub fn precision(mut self, precision: i64, scale: i64) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn default(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    pub fn build(self) -> Row {
        self.row
            .with("precision", SqlValue::Int(self.precision))
            .with("scale", SqlValue::Int(self.scale))
            .with("is_nullable", SqlValue::Bool(self.nullable))
            .with("is_identity", SqlValue::Bool(self.identity))
            .with(
                "default_definition",
                self.default.map_or(SqlValue::Null, SqlValue::Text),
            )
    }
}

/// `[Id INT IDENTITY NOT NULL, Name VARCHAR(50) NULL]`
pub fn users_catalog() -> Vec<Row> {
    vec![
        catalog_row("Id", "int", 4)
            .precision(10, 0)
            .not_null()
            .identity()
            .build(),
        catalog_row("Name", "varchar", 50).build(),
    ]
}
