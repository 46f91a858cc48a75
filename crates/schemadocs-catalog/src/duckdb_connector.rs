//! DuckDB connector for local database files and in-memory databases
//!
//! Schemas and tables come from `information_schema`, columns (with comments)
//! from the `duckdb_columns()` table function. DuckDB is embedded, so calls
//! run inline on the current task.

use crate::connector::{Connector, FetchError};
use schemadocs_core::{LogicalType, Schema};

#[cfg(feature = "duckdb")]
use schemadocs_core::{Column, Nullability};

#[cfg(feature = "duckdb")]
use std::sync::Mutex;

/// Path that selects an in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// DuckDB connector
pub struct DuckDbConnector {
    #[cfg(feature = "duckdb")]
    conn: Mutex<duckdb::Connection>,

    /// Database path as configured
    path: String,

    /// `memory` or the file stem
    database: String,
}

impl DuckDbConnector {
    /// Open a database file, or an in-memory database for `:memory:`
    #[cfg(feature = "duckdb")]
    pub fn open(path: impl Into<String>) -> Result<Self, FetchError> {
        let path = path.into();

        let conn = if path == MEMORY_PATH || path.is_empty() {
            duckdb::Connection::open_in_memory()
        } else {
            if !std::path::Path::new(&path).exists() {
                return Err(FetchError::ConfigError(format!(
                    "DuckDB database file not found: {}",
                    path
                )));
            }
            duckdb::Connection::open(&path)
        }
        .map_err(|e| FetchError::NetworkError(format!("Failed to open DuckDB at {}: {}", path, e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            database: schemadocs_core::duckdb_identifier(Some(&path)),
            path,
        })
    }

    /// Create connector without duckdb feature (returns error)
    #[cfg(not(feature = "duckdb"))]
    pub fn open(_path: impl Into<String>) -> Result<Self, FetchError> {
        Err(feature_disabled())
    }

    /// Run DDL/DML, mainly used to seed fixtures
    #[cfg(feature = "duckdb")]
    pub fn execute_batch(&self, sql: &str) -> Result<(), FetchError> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| FetchError::QueryError(e.to_string()))
    }

    /// Configured database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Convert DuckDB type to LogicalType
    pub fn map_duckdb_type(duck_type: &str) -> LogicalType {
        let trimmed = duck_type.trim();

        if let Some(element) = trimmed.strip_suffix("[]") {
            return LogicalType::Array {
                element_type: Box::new(Self::map_duckdb_type(element)),
            };
        }

        let base_type = trimmed.split('(').next()
            .unwrap_or(trimmed)
            .trim()
            .to_uppercase();

        match base_type.as_str() {
            "BOOLEAN" | "BOOL" => LogicalType::Bool,

            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" | "HUGEINT"
            | "UTINYINT" | "USMALLINT" | "UINTEGER" | "UBIGINT" | "UHUGEINT" => LogicalType::Int,

            "FLOAT" | "REAL" | "DOUBLE" => LogicalType::Float,

            "DECIMAL" | "NUMERIC" => match crate::connector::parse_precision_scale(trimmed) {
                Some((precision, scale)) => LogicalType::Decimal { precision, scale },
                // DuckDB's default DECIMAL width
                None => LogicalType::Decimal {
                    precision: Some(18),
                    scale: Some(3),
                },
            },

            "VARCHAR" | "TEXT" | "STRING" | "CHAR" | "BPCHAR" | "UUID" => LogicalType::String,

            "BLOB" | "BYTEA" | "BIT" => LogicalType::Bytes,

            "DATE" => LogicalType::Date,

            "TIMESTAMP" | "DATETIME" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS"
            | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" | "TIME" => LogicalType::Timestamp,

            "JSON" => LogicalType::Json,

            "STRUCT" => LogicalType::Struct { fields: vec![] },

            "LIST" => LogicalType::Array {
                element_type: Box::new(LogicalType::Other("ANY".to_string())),
            },

            _ => LogicalType::Other(trimmed.to_string()),
        }
    }

    #[cfg(feature = "duckdb")]
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, duckdb::Connection>, FetchError> {
        self.conn
            .lock()
            .map_err(|_| FetchError::QueryError("DuckDB connection lock poisoned".to_string()))
    }

    #[cfg(feature = "duckdb")]
    fn query_names(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<Vec<String>, FetchError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)
            .map_err(|e| FetchError::QueryError(e.to_string()))?;

        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))
            .map_err(|e| FetchError::QueryError(e.to_string()))?;

        let names = rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(names)
    }

    #[cfg(feature = "duckdb")]
    fn query_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>, FetchError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT column_name, data_type, is_nullable, comment
            FROM duckdb_columns()
            WHERE database_name = current_database()
              AND schema_name = ?
              AND table_name = ?
            ORDER BY column_index
            "#,
        )
        .map_err(|e| FetchError::QueryError(e.to_string()))?;

        let rows = stmt.query_map(duckdb::params![schema, table], |row| {
            let name: String = row.get(0)?;
            let data_type: String = row.get(1)?;
            let is_nullable: bool = row.get(2)?;
            let comment: Option<String> = row.get(3)?;
            Ok((name, data_type, is_nullable, comment))
        })
        .map_err(|e| FetchError::QueryError(e.to_string()))?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, data_type, is_nullable, comment) =
                row.map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

            let nullable = if is_nullable { Nullability::Yes } else { Nullability::No };
            let mut column = Column::new(name, Self::map_duckdb_type(&data_type))
                .with_nullability(nullable);
            if let Some(comment) = comment {
                column = column.with_description(comment);
            }
            columns.push(column);
        }

        Ok(columns)
    }
}

#[cfg(not(feature = "duckdb"))]
fn feature_disabled() -> FetchError {
    FetchError::ConfigError(
        "DuckDB support not compiled. Rebuild with: cargo build --features duckdb".to_string()
    )
}

#[async_trait::async_trait]
impl Connector for DuckDbConnector {
    fn name(&self) -> &'static str {
        "DuckDB"
    }

    fn database(&self) -> &str {
        &self.database
    }

    #[cfg(feature = "duckdb")]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        self.query_names(
            r#"
            SELECT schema_name
            FROM information_schema.schemata
            WHERE catalog_name = current_database()
              AND schema_name NOT IN ('information_schema', 'pg_catalog')
            ORDER BY schema_name
            "#,
            &[],
        )
    }

    #[cfg(not(feature = "duckdb"))]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "duckdb")]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        self.query_names(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_catalog = current_database()
              AND table_schema = ?
            ORDER BY table_name
            "#,
            &[&schema],
        )
    }

    #[cfg(not(feature = "duckdb"))]
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "duckdb")]
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        let columns = self.query_columns(schema, table)?;

        if columns.is_empty() {
            return Err(FetchError::TableNotFound(format!(
                "Table {} not found or has no columns",
                self.table_identifier(schema, table).fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    #[cfg(not(feature = "duckdb"))]
    async fn fetch_schema(&self, _schema: &str, _table: &str) -> Result<Schema, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "duckdb")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.query_names("SELECT 'ok'", &[]).map(|_| ())
    }

    #[cfg(not(feature = "duckdb"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(feature_disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert!(matches!(DuckDbConnector::map_duckdb_type("INTEGER"), LogicalType::Int));
        assert!(matches!(DuckDbConnector::map_duckdb_type("BIGINT"), LogicalType::Int));
        assert!(matches!(DuckDbConnector::map_duckdb_type("VARCHAR"), LogicalType::String));
        assert!(matches!(DuckDbConnector::map_duckdb_type("DOUBLE"), LogicalType::Float));
        assert!(matches!(DuckDbConnector::map_duckdb_type("BOOLEAN"), LogicalType::Bool));
        assert!(matches!(DuckDbConnector::map_duckdb_type("TIMESTAMP WITH TIME ZONE"), LogicalType::Timestamp));
        assert!(matches!(DuckDbConnector::map_duckdb_type("BLOB"), LogicalType::Bytes));
    }

    #[test]
    fn test_decimal_mapping() {
        assert_eq!(
            DuckDbConnector::map_duckdb_type("DECIMAL(10,2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(
            DuckDbConnector::map_duckdb_type("DECIMAL"),
            LogicalType::Decimal { precision: Some(18), scale: Some(3) }
        );
    }

    #[test]
    fn test_list_mapping() {
        assert_eq!(
            DuckDbConnector::map_duckdb_type("INTEGER[]"),
            LogicalType::Array { element_type: Box::new(LogicalType::Int) }
        );
    }

    #[test]
    fn test_unmapped_type_keeps_native_name() {
        assert_eq!(
            DuckDbConnector::map_duckdb_type("MAP(VARCHAR, INTEGER)"),
            LogicalType::Other("MAP(VARCHAR, INTEGER)".to_string())
        );
    }

    #[test]
    #[cfg(not(feature = "duckdb"))]
    fn test_open_requires_feature() {
        let result = DuckDbConnector::open(MEMORY_PATH);
        assert!(matches!(result, Err(FetchError::ConfigError(msg)) if msg.contains("--features duckdb")));
    }

    #[tokio::test]
    #[cfg(feature = "duckdb")]
    async fn test_in_memory_listing() {
        let connector = DuckDbConnector::open(MEMORY_PATH).unwrap();
        connector
            .execute_batch(
                "CREATE SCHEMA analytics;
                 CREATE TABLE main.users (id INTEGER NOT NULL, email VARCHAR);
                 COMMENT ON COLUMN main.users.email IS 'Login address';
                 CREATE TABLE analytics.orders (id INTEGER, total DECIMAL(10,2));",
            )
            .unwrap();

        assert_eq!(connector.database(), "memory");

        let schemas = connector.list_schemas().await.unwrap();
        assert!(schemas.contains(&"main".to_string()));
        assert!(schemas.contains(&"analytics".to_string()));
        assert!(!schemas.contains(&"information_schema".to_string()));

        assert_eq!(connector.list_tables("main").await.unwrap(), vec!["users".to_string()]);

        let schema = connector.fetch_schema("main", "users").await.unwrap();
        assert_eq!(schema.column_names(), vec!["id", "email"]);
        assert_eq!(schema.columns[0].nullable, Nullability::No);
        assert_eq!(schema.columns[1].description.as_deref(), Some("Login address"));

        let missing = connector.fetch_schema("main", "nope").await;
        assert!(matches!(missing, Err(FetchError::TableNotFound(_))));
    }

    #[test]
    #[cfg(feature = "duckdb")]
    fn test_missing_file_is_rejected() {
        let result = DuckDbConnector::open("/definitely/not/here.duckdb");
        assert!(matches!(result, Err(FetchError::ConfigError(_))));
    }
}
