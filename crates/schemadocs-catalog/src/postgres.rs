//! PostgreSQL connector using information_schema
//!
//! Works with PostgreSQL 9.4+ and compatible servers (Redshift,
//! CockroachDB). System schemas are never listed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let connector = PostgresConnector::connect(
//!     "localhost", 5432, "mydb", "username", "password"
//! ).await?;
//!
//! // Same, over TLS
//! let connector = PostgresConnector::connect_with_tls(
//!     "db.example.com", 5432, "mydb", "username", "password"
//! ).await?;
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema.html

use crate::connector::{Connector, FetchError};
use schemadocs_core::{LogicalType, Schema};

#[cfg(feature = "postgres")]
use schemadocs_core::{Column, Nullability};

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, Config as PgConfig, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const LIST_SCHEMAS: &str = r#"
    SELECT schema_name::text
    FROM information_schema.schemata
    WHERE schema_name NOT IN ('pg_catalog', 'information_schema')
      AND schema_name NOT LIKE 'pg\_toast%'
      AND schema_name NOT LIKE 'pg\_temp\_%'
    ORDER BY schema_name
"#;

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const LIST_TABLES: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
    ORDER BY table_name
"#;

#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
const LIST_COLUMNS: &str = r#"
    SELECT
        c.column_name::text,
        c.data_type::text,
        c.is_nullable::text,
        c.numeric_precision::int,
        c.numeric_scale::int,
        c.udt_name::text,
        col_description(
            format('%I.%I', c.table_schema, c.table_name)::regclass::oid,
            c.ordinal_position::int
        ) AS description
    FROM information_schema.columns c
    WHERE c.table_schema = $1
      AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

/// PostgreSQL connector bound to one database
pub struct PostgresConnector {
    #[cfg(feature = "postgres")]
    client: Client,

    host: String,

    port: u16,

    database: String,
}

impl PostgresConnector {
    /// Connect without TLS
    #[cfg(feature = "postgres")]
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let host = host.into();
        let database = database.into();
        let config = Self::pg_config(&host, port, &database, &user.into(), &password.into());

        let (client, connection) = config.connect(NoTls)
            .await
            .map_err(|e| classify_connect_error(&host, port, e))?;

        let (log_host, log_port) = (host.clone(), port);
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(host = %log_host, port = log_port, error = %e, "PostgreSQL connection closed");
            }
        });

        Ok(Self { client, host, port, database })
    }

    /// Connect over TLS using the platform trust store
    #[cfg(feature = "postgres")]
    pub async fn connect_with_tls(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let host = host.into();
        let database = database.into();
        let config = Self::pg_config(&host, port, &database, &user.into(), &password.into());

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| FetchError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;

        let (client, connection) = config.connect(MakeTlsConnector::new(connector))
            .await
            .map_err(|e| classify_connect_error(&host, port, e))?;

        let (log_host, log_port) = (host.clone(), port);
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(host = %log_host, port = log_port, error = %e, "PostgreSQL TLS connection closed");
            }
        });

        Ok(Self { client, host, port, database })
    }

    #[cfg(not(feature = "postgres"))]
    pub async fn connect(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(not(feature = "postgres"))]
    pub async fn connect_with_tls(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "postgres")]
    fn pg_config(host: &str, port: u16, database: &str, user: &str, password: &str) -> PgConfig {
        let mut config = PgConfig::new();
        config
            .host(host)
            .port(port)
            .dbname(database)
            .user(user)
            .application_name("schemadocs");
        if !password.is_empty() {
            config.password(password);
        }
        config
    }

    /// Convert PostgreSQL type to LogicalType
    pub fn map_postgres_type(pg_type: &str) -> LogicalType {
        let trimmed = pg_type.trim();

        // int4[] or the internal _int4 spelling
        if let Some(element) = trimmed.strip_suffix("[]").or_else(|| trimmed.strip_prefix('_')) {
            return LogicalType::Array {
                element_type: Box::new(Self::map_postgres_type(element)),
            };
        }

        let base_type = trimmed.split('(').next()
            .unwrap_or(trimmed)
            .trim()
            .to_lowercase();

        match base_type.as_str() {
            "boolean" | "bool" => LogicalType::Bool,

            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8"
            | "smallserial" | "serial2" | "serial" | "serial4" | "bigserial" | "serial8" => {
                LogicalType::Int
            }

            "real" | "float4" | "double precision" | "float8" | "float" => LogicalType::Float,

            "numeric" | "decimal" => match crate::connector::parse_precision_scale(trimmed) {
                Some((precision, scale)) => LogicalType::Decimal { precision, scale },
                None => LogicalType::Decimal { precision: None, scale: None },
            },

            "money" => LogicalType::Decimal {
                precision: Some(19),
                scale: Some(2),
            },

            "character varying" | "varchar" | "character" | "char" | "bpchar" | "text"
            | "name" | "citext" | "uuid" => LogicalType::String,

            "bytea" => LogicalType::Bytes,

            "date" => LogicalType::Date,

            "timestamp without time zone" | "timestamp" | "timestamp with time zone"
            | "timestamptz" => LogicalType::Timestamp,

            "json" | "jsonb" => LogicalType::Json,

            _ => LogicalType::Other(trimmed.to_string()),
        }
    }

    /// Full type text for a column row
    #[cfg_attr(not(feature = "postgres"), allow(dead_code))]
    fn full_type(data_type: &str, udt_name: &str, precision: Option<i32>, scale: Option<i32>) -> String {
        match data_type {
            "numeric" | "decimal" => match (precision, scale) {
                (Some(p), Some(s)) => format!("numeric({},{})", p, s),
                (Some(p), None) => format!("numeric({})", p),
                _ => data_type.to_string(),
            },
            "ARRAY" => udt_name.to_string(),
            "USER-DEFINED" => udt_name.to_string(),
            _ => data_type.to_string(),
        }
    }

    /// Get the connection host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the connection port
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[cfg(not(feature = "postgres"))]
fn feature_disabled() -> FetchError {
    FetchError::ConfigError(
        "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
    )
}

#[cfg(feature = "postgres")]
fn classify_connect_error(host: &str, port: u16, err: tokio_postgres::Error) -> FetchError {
    let message = err.to_string();
    if message.contains("password authentication failed") || message.contains("no password") {
        FetchError::AuthenticationError(format!("PostgreSQL at {}:{}: {}", host, port, message))
    } else if message.contains("does not exist") {
        FetchError::ConfigError(format!("PostgreSQL at {}:{}: {}", host, port, message))
    } else {
        FetchError::NetworkError(format!("Failed to connect to PostgreSQL at {}:{}: {}", host, port, message))
    }
}

#[cfg(feature = "postgres")]
fn classify_query_error(context: &str, err: tokio_postgres::Error) -> FetchError {
    let message = err.to_string();
    if message.contains("does not exist") {
        FetchError::TableNotFound(format!("{}: {}", context, message))
    } else if message.contains("permission denied") {
        FetchError::PermissionDenied(format!("Cannot access {}: {}", context, message))
    } else {
        FetchError::QueryError(message)
    }
}

#[async_trait::async_trait]
impl Connector for PostgresConnector {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn database(&self) -> &str {
        &self.database
    }

    #[cfg(feature = "postgres")]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        let rows = self.client
            .query(LIST_SCHEMAS, &[])
            .await
            .map_err(|e| classify_query_error(&self.database, e))?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    #[cfg(not(feature = "postgres"))]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "postgres")]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        let rows = self.client
            .query(LIST_TABLES, &[&schema])
            .await
            .map_err(|e| classify_query_error(schema, e))?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    #[cfg(not(feature = "postgres"))]
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "postgres")]
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        let table_id = self.table_identifier(schema, table);
        let rows = self.client
            .query(LIST_COLUMNS, &[&schema, &table])
            .await
            .map_err(|e| classify_query_error(&table_id.fqn(), e))?;

        let columns: Vec<Column> = rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                let is_nullable: String = row.get(2);
                let precision: Option<i32> = row.get(3);
                let scale: Option<i32> = row.get(4);
                let udt_name: String = row.get(5);
                let description: Option<String> = row.get(6);

                let full_type = Self::full_type(&data_type, &udt_name, precision, scale);
                let mut column = Column::new(name, Self::map_postgres_type(&full_type))
                    .with_nullability(Nullability::from_is_nullable(&is_nullable));
                if let Some(description) = description {
                    column = column.with_description(description);
                }
                column
            })
            .collect();

        if columns.is_empty() {
            return Err(FetchError::TableNotFound(format!(
                "Table {} not found or has no columns",
                table_id.fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_schema(&self, _schema: &str, _table: &str) -> Result<Schema, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| FetchError::NetworkError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(feature_disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_mapping() {
        assert!(matches!(PostgresConnector::map_postgres_type("integer"), LogicalType::Int));
        assert!(matches!(PostgresConnector::map_postgres_type("bigserial"), LogicalType::Int));
        assert!(matches!(PostgresConnector::map_postgres_type("double precision"), LogicalType::Float));
        assert!(matches!(PostgresConnector::map_postgres_type("character varying"), LogicalType::String));
        assert!(matches!(PostgresConnector::map_postgres_type("bytea"), LogicalType::Bytes));
        assert!(matches!(PostgresConnector::map_postgres_type("timestamp with time zone"), LogicalType::Timestamp));
        assert!(matches!(PostgresConnector::map_postgres_type("jsonb"), LogicalType::Json));
        assert_eq!(
            PostgresConnector::map_postgres_type("inet"),
            LogicalType::Other("inet".to_string())
        );
    }

    #[test]
    fn test_numeric_type_mapping() {
        assert_eq!(
            PostgresConnector::map_postgres_type("numeric(10,2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(
            PostgresConnector::map_postgres_type("numeric"),
            LogicalType::Decimal { precision: None, scale: None }
        );
    }

    #[test]
    fn test_array_type_mapping() {
        assert_eq!(
            PostgresConnector::map_postgres_type("_int4"),
            LogicalType::Array { element_type: Box::new(LogicalType::Int) }
        );
        assert_eq!(
            PostgresConnector::map_postgres_type("text[]"),
            LogicalType::Array { element_type: Box::new(LogicalType::String) }
        );
    }

    #[test]
    fn test_full_type() {
        assert_eq!(PostgresConnector::full_type("numeric", "numeric", Some(12), Some(3)), "numeric(12,3)");
        assert_eq!(PostgresConnector::full_type("ARRAY", "_text", None, None), "_text");
        assert_eq!(PostgresConnector::full_type("USER-DEFINED", "citext", None, None), "citext");
        assert_eq!(PostgresConnector::full_type("text", "text", None, None), "text");
    }

    #[test]
    fn test_system_schemas_excluded() {
        assert!(LIST_SCHEMAS.contains("'pg_catalog', 'information_schema'"));
        assert!(LIST_SCHEMAS.contains("pg\\_toast%"));
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_connect_without_feature() {
        let result = PostgresConnector::connect("localhost", 5432, "db", "user", "pass").await;
        assert!(matches!(result, Err(FetchError::ConfigError(msg)) if msg.contains("--features postgres")));
    }
}
