//! Connector trait for enumerating schemas, tables and columns

use schemadocs_core::{BackendType, ConfigError, DatabaseConfig, Schema};
use std::fmt;

/// Identifies a table in a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentifier {
    /// Database/project/catalog name
    pub database: String,

    /// Schema/dataset name
    pub schema: String,

    /// Table name
    pub table: String,
}

impl TableIdentifier {
    /// Create a new table identifier
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Get fully qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.table)
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// Errors that can occur when talking to a backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ConfigError> for FetchError {
    fn from(err: ConfigError) -> Self {
        FetchError::ConfigError(err.to_string())
    }
}

/// A live connection to one configured database
///
/// Backends with a project/dataset hierarchy (BigQuery) and those with a
/// catalog/schema hierarchy (Databricks, Snowflake, PostgreSQL, DuckDB) are
/// presented the same way: the top level is fixed by configuration and
/// [`Connector::list_schemas`] enumerates the level below it.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Get the connector name (e.g., "BigQuery", "DuckDB")
    fn name(&self) -> &'static str;

    /// Project, catalog or database this connection is bound to
    fn database(&self) -> &str;

    /// Enumerate the schemas (datasets) of the database
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError>;

    /// Enumerate the tables of one schema
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError>;

    /// Fetch the column metadata of one table
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError>;

    /// Test the connection to the backend
    ///
    /// This is useful for validating credentials before attempting
    /// to list anything.
    async fn test_connection(&self) -> Result<(), FetchError>;

    /// Identifier of a table inside this connection's database
    fn table_identifier(&self, schema: &str, table: &str) -> TableIdentifier {
        TableIdentifier::new(self.database(), schema, table)
    }
}

/// Opens connections for configured databases
///
/// The sync orchestrator goes through this trait so tests can hand it
/// in-memory connectors.
#[async_trait::async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connector>, FetchError>;
}

/// Production [`Connect`] implementation backed by [`connect`]
#[derive(Debug, Default, Clone, Copy)]
pub struct WarehouseConnect;

#[async_trait::async_trait]
impl Connect for WarehouseConnect {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connector>, FetchError> {
        connect(config).await
    }
}

/// Open a connection for a configured database and verify it
///
/// Credential, network and file problems surface here so a failing backend
/// is rejected before any listing happens.
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn Connector>, FetchError> {
    let connector: Box<dyn Connector> = match config.require_backend_type()? {
        BackendType::BigQuery => {
            let project_id = config.identifier()?;
            let connector =
                crate::BigQueryConnector::connect(project_id, config.credentials_path.as_deref()).await?;
            Box::new(connector.with_location(config.location.clone()))
        }
        BackendType::DuckDb => {
            let path = config.path.as_deref().unwrap_or(crate::duckdb_connector::MEMORY_PATH);
            Box::new(crate::DuckDbConnector::open(path)?)
        }
        BackendType::Databricks => {
            let host = required(config, "server_hostname", &config.server_hostname)?;
            let http_path = required(config, "http_path", &config.http_path)?;
            let token = required(config, "access_token", &config.access_token)?;
            Box::new(crate::DatabricksConnector::new(
                host,
                &http_path,
                token,
                config.identifier()?,
            )?)
        }
        BackendType::Snowflake => {
            let account = required(config, "account", &config.account)?;
            let user = required(config, "user", &config.user)?;
            let password = required(config, "password", &config.password)?;

            let mut builder = crate::SnowflakeConnector::new(account, user, password)
                .with_database(config.identifier()?);
            if let Some(warehouse) = &config.warehouse {
                builder = builder.with_warehouse(warehouse);
            }
            if let Some(role) = &config.role {
                builder = builder.with_role(role);
            }
            Box::new(builder.build()?)
        }
        BackendType::Postgres => {
            let host = config.host.clone().unwrap_or_else(|| "localhost".to_string());
            let port = config.port.unwrap_or(5432);
            let database = config.identifier()?;
            let user = config.user.clone().unwrap_or_else(|| "postgres".to_string());
            let password = config.password.clone().unwrap_or_default();

            let connector = if config.tls {
                crate::PostgresConnector::connect_with_tls(host, port, database, user, password).await?
            } else {
                crate::PostgresConnector::connect(host, port, database, user, password).await?
            };
            Box::new(connector)
        }
    };

    connector.test_connection().await?;
    Ok(connector)
}

fn required(
    config: &DatabaseConfig,
    field: &'static str,
    value: &Option<String>,
) -> Result<String, FetchError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingField {
            database: config.name.clone(),
            field,
        }
        .into()),
    }
}

/// Quote a string literal for SQL text that cannot take bind parameters
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Parse `(precision, scale)` out of a type like `NUMERIC(10,2)`
pub(crate) fn parse_precision_scale(type_str: &str) -> Option<(Option<u16>, Option<u16>)> {
    let params = type_str.split('(').nth(1)?;
    let params = params.split(')').next()?;
    let parts: Vec<&str> = params.split(',').collect();
    match parts.as_slice() {
        [precision, scale] => Some((precision.trim().parse().ok(), scale.trim().parse().ok())),
        [precision] => Some((precision.trim().parse().ok(), Some(0))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_identifier() {
        let table = TableIdentifier::new("my_project", "my_dataset", "my_table");
        assert_eq!(table.database, "my_project");
        assert_eq!(table.schema, "my_dataset");
        assert_eq!(table.table, "my_table");
        assert_eq!(table.fqn(), "my_project.my_dataset.my_table");
        assert_eq!(table.to_string(), "my_project.my_dataset.my_table");
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("main"), "'main'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_parse_precision_scale() {
        assert_eq!(parse_precision_scale("NUMERIC(10,2)"), Some((Some(10), Some(2))));
        assert_eq!(parse_precision_scale("NUMBER(38)"), Some((Some(38), Some(0))));
        assert_eq!(parse_precision_scale("DECIMAL"), None);
    }

    #[test]
    fn test_config_error_converts() {
        let err: FetchError = ConfigError::MissingField {
            database: "wh".to_string(),
            field: "account",
        }
        .into();
        assert!(matches!(err, FetchError::ConfigError(msg) if msg.contains("account")));
    }

    #[tokio::test]
    async fn test_connect_rejects_unsupported_type() {
        let config = DatabaseConfig::new("legacy", "oracle");
        let result = connect(&config).await;
        assert!(matches!(result, Err(FetchError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_connect_requires_snowflake_account() {
        let mut config = DatabaseConfig::new("wh", "snowflake");
        config.database = Some("ANALYTICS".to_string());
        let result = connect(&config).await;
        assert!(matches!(result, Err(FetchError::ConfigError(msg)) if msg.contains("account")));
    }
}
