//! Snowflake connector using INFORMATION_SCHEMA
//!
//! Schemas, tables and columns are read from the configured database's
//! `INFORMATION_SCHEMA` views. The role needs USAGE on the database and
//! its schemas.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let connector = SnowflakeConnector::new("xy12345.us-east-1", "username", "password")
//!     .with_database("ANALYTICS")
//!     .with_warehouse("COMPUTE_WH")
//!     .with_role("ANALYST")
//!     .build()?;
//! ```
//!
//! Reference: https://docs.snowflake.com/en/sql-reference/info-schema

use crate::connector::{Connector, FetchError};
use schemadocs_core::{LogicalType, Schema};

#[cfg(feature = "snowflake")]
use crate::connector::quote_literal;

#[cfg(feature = "snowflake")]
use schemadocs_core::{Column, Nullability};

#[cfg(feature = "snowflake")]
use snowflake_api::{QueryResult, SnowflakeApi};

#[cfg(feature = "snowflake")]
use arrow_array::{cast::AsArray, types::Int64Type, Array, RecordBatch};

/// Builder for SnowflakeConnector
#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
pub struct SnowflakeConnectorBuilder {
    account: String,
    username: String,
    password: String,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
}

impl SnowflakeConnectorBuilder {
    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the database to document
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    fn require_database(&self) -> Result<String, FetchError> {
        match self.database.as_deref() {
            Some(db) if !db.is_empty() => Ok(db.to_string()),
            _ => Err(FetchError::ConfigError(format!(
                "Snowflake account '{}' needs a database",
                self.account
            ))),
        }
    }

    /// Build the connector
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeConnector, FetchError> {
        let database = self.require_database()?;
        let api = SnowflakeApi::with_password_auth(
            &self.account,
            self.warehouse.as_deref(),
            Some(database.as_str()),
            None,
            &self.username,
            self.role.as_deref(),
            &self.password,
        )
        .map_err(|e| FetchError::AuthenticationError(format!(
            "Failed to authenticate with Snowflake: {}",
            e
        )))?;

        tracing::debug!(account = %self.account, database = %database, "opened Snowflake session");

        Ok(SnowflakeConnector { api, database })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeConnector, FetchError> {
        self.require_database()?;
        Err(feature_disabled())
    }
}

/// Snowflake connector bound to one database
pub struct SnowflakeConnector {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    database: String,
}

impl SnowflakeConnector {
    /// Start building a connector with password authentication
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeConnectorBuilder {
        SnowflakeConnectorBuilder {
            account: account.into(),
            username: username.into(),
            password: password.into(),
            warehouse: None,
            role: None,
            database: None,
        }
    }

    /// Convert Snowflake type to LogicalType
    pub fn map_snowflake_type(sf_type: &str) -> LogicalType {
        // Types may carry precision/scale like "NUMBER(38,0)"
        let base_type = sf_type.split('(').next()
            .unwrap_or(sf_type)
            .trim()
            .to_uppercase();

        match base_type.as_str() {
            "BOOLEAN" => LogicalType::Bool,

            "NUMBER" | "DECIMAL" | "NUMERIC" => {
                match crate::connector::parse_precision_scale(sf_type) {
                    Some((_, Some(0))) => LogicalType::Int,
                    Some((precision, scale)) => LogicalType::Decimal { precision, scale },
                    None => LogicalType::Decimal {
                        precision: Some(38),
                        scale: Some(0),
                    },
                }
            }

            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" => LogicalType::Int,

            "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => {
                LogicalType::Float
            }

            "VARCHAR" | "STRING" | "TEXT" | "CHAR" | "CHARACTER" => LogicalType::String,

            "BINARY" | "VARBINARY" => LogicalType::Bytes,

            "DATE" => LogicalType::Date,

            "DATETIME" | "TIMESTAMP" | "TIMESTAMP_NTZ" | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => {
                LogicalType::Timestamp
            }

            "VARIANT" | "OBJECT" => LogicalType::Json,

            "ARRAY" => LogicalType::Array {
                element_type: Box::new(LogicalType::Json),
            },

            _ => LogicalType::Other(sf_type.trim().to_string()),
        }
    }

    /// Full type text with precision and scale for NUMBER columns
    #[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
    fn full_type(data_type: &str, precision: Option<i64>, scale: Option<i64>) -> String {
        if data_type != "NUMBER" {
            return data_type.to_string();
        }
        match (precision, scale) {
            (Some(p), Some(s)) => format!("NUMBER({},{})", p, s),
            (Some(p), None) => format!("NUMBER({})", p),
            _ => data_type.to_string(),
        }
    }

    #[cfg(feature = "snowflake")]
    async fn exec(&self, query: &str, context: &str) -> Result<Vec<RecordBatch>, FetchError> {
        let result = self.api.exec(query).await.map_err(|e| classify_error(&e.to_string(), context))?;

        match result {
            QueryResult::Arrow(batches) => Ok(batches),
            QueryResult::Empty => Ok(Vec::new()),
            QueryResult::Json(_) => Err(FetchError::InvalidResponse(
                "Unexpected JSON result format".to_string()
            )),
        }
    }

    #[cfg(feature = "snowflake")]
    async fn query_names(&self, query: &str, column: &str, context: &str) -> Result<Vec<String>, FetchError> {
        let batches = self.exec(query, context).await?;
        let mut names = Vec::new();
        for batch in &batches {
            let values = string_column(batch, column)?;
            for row in 0..batch.num_rows() {
                if !values.is_null(row) {
                    names.push(values.value(row).to_string());
                }
            }
        }
        Ok(names)
    }
}

#[cfg(not(feature = "snowflake"))]
fn feature_disabled() -> FetchError {
    FetchError::ConfigError(
        "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
    )
}

#[cfg_attr(not(feature = "snowflake"), allow(dead_code))]
fn classify_error(message: &str, context: &str) -> FetchError {
    if message.contains("does not exist") || message.contains("not found") {
        FetchError::SchemaNotFound(format!("{}: {}", context, message))
    } else if message.contains("Insufficient privileges") || message.contains("not authorized") {
        FetchError::PermissionDenied(format!("Cannot access {}: {}", context, message))
    } else if message.contains("Incorrect username or password") {
        FetchError::AuthenticationError(message.to_string())
    } else {
        FetchError::QueryError(message.to_string())
    }
}

#[cfg(feature = "snowflake")]
fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a arrow_array::StringArray, FetchError> {
    let idx = batch.schema().index_of(name)
        .map_err(|_| FetchError::InvalidResponse(format!("Missing {} column", name)))?;
    batch.column(idx).as_string_opt::<i32>()
        .ok_or_else(|| FetchError::InvalidResponse(format!("{} is not a string column", name)))
}

#[cfg(feature = "snowflake")]
fn int_value(batch: &RecordBatch, name: &str, row: usize) -> Option<i64> {
    let idx = batch.schema().index_of(name).ok()?;
    let values = batch.column(idx).as_primitive_opt::<Int64Type>()?;
    if values.is_null(row) {
        None
    } else {
        Some(values.value(row))
    }
}

#[async_trait::async_trait]
impl Connector for SnowflakeConnector {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    fn database(&self) -> &str {
        &self.database
    }

    #[cfg(feature = "snowflake")]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        let query = format!(
            "SELECT SCHEMA_NAME FROM {}.INFORMATION_SCHEMA.SCHEMATA \
             WHERE SCHEMA_NAME <> 'INFORMATION_SCHEMA' ORDER BY SCHEMA_NAME",
            self.database
        );
        self.query_names(&query, "SCHEMA_NAME", &self.database).await
    }

    #[cfg(not(feature = "snowflake"))]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "snowflake")]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        let query = format!(
            "SELECT TABLE_NAME FROM {}.INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = {} ORDER BY TABLE_NAME",
            self.database,
            quote_literal(schema)
        );
        let context = format!("{}.{}", self.database, schema);
        self.query_names(&query, "TABLE_NAME", &context).await
    }

    #[cfg(not(feature = "snowflake"))]
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "snowflake")]
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        let table_id = self.table_identifier(schema, table);
        let query = format!(
            r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                IS_NULLABLE,
                NUMERIC_PRECISION,
                NUMERIC_SCALE,
                COMMENT
            FROM {}.INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = {}
              AND TABLE_NAME = {}
            ORDER BY ORDINAL_POSITION
            "#,
            self.database,
            quote_literal(schema),
            quote_literal(table)
        );

        let batches = self.exec(&query, &table_id.fqn()).await?;

        let mut columns = Vec::new();
        for batch in &batches {
            let names = string_column(batch, "COLUMN_NAME")?;
            let data_types = string_column(batch, "DATA_TYPE")?;
            let nullables = string_column(batch, "IS_NULLABLE")?;
            let comments = string_column(batch, "COMMENT").ok();

            for row in 0..batch.num_rows() {
                let full_type = Self::full_type(
                    data_types.value(row),
                    int_value(batch, "NUMERIC_PRECISION", row),
                    int_value(batch, "NUMERIC_SCALE", row),
                );

                let mut column = Column::new(names.value(row), Self::map_snowflake_type(&full_type))
                    .with_nullability(Nullability::from_is_nullable(nullables.value(row)));

                if let Some(comments) = comments.filter(|c| !c.is_null(row)) {
                    column = column.with_description(comments.value(row));
                }

                columns.push(column);
            }
        }

        if columns.is_empty() {
            return Err(FetchError::TableNotFound(format!(
                "Table {} not found or has no columns",
                table_id.fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    #[cfg(not(feature = "snowflake"))]
    async fn fetch_schema(&self, _schema: &str, _table: &str) -> Result<Schema, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "snowflake")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.api.exec("SELECT 1")
            .await
            .map_err(|e| FetchError::NetworkError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "snowflake"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(feature_disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert!(matches!(SnowflakeConnector::map_snowflake_type("NUMBER(38,0)"), LogicalType::Int));
        assert!(matches!(SnowflakeConnector::map_snowflake_type("NUMBER(10)"), LogicalType::Int));
        assert!(matches!(SnowflakeConnector::map_snowflake_type("VARCHAR"), LogicalType::String));
        assert!(matches!(SnowflakeConnector::map_snowflake_type("BINARY"), LogicalType::Bytes));
        assert!(matches!(SnowflakeConnector::map_snowflake_type("TIMESTAMP_NTZ"), LogicalType::Timestamp));
        assert!(matches!(SnowflakeConnector::map_snowflake_type("VARIANT"), LogicalType::Json));
        assert_eq!(
            SnowflakeConnector::map_snowflake_type("GEOGRAPHY"),
            LogicalType::Other("GEOGRAPHY".to_string())
        );
    }

    #[test]
    fn test_decimal_mapping() {
        assert_eq!(
            SnowflakeConnector::map_snowflake_type("NUMBER(10,2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(
            SnowflakeConnector::map_snowflake_type("NUMBER"),
            LogicalType::Decimal { precision: Some(38), scale: Some(0) }
        );
    }

    #[test]
    fn test_full_type() {
        assert_eq!(SnowflakeConnector::full_type("NUMBER", Some(10), Some(2)), "NUMBER(10,2)");
        assert_eq!(SnowflakeConnector::full_type("NUMBER", Some(38), None), "NUMBER(38)");
        assert_eq!(SnowflakeConnector::full_type("TEXT", Some(1), Some(1)), "TEXT");
    }

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            classify_error("Schema 'X' does not exist or not authorized.", "DB.X"),
            FetchError::SchemaNotFound(_)
        ));
        assert!(matches!(
            classify_error("Insufficient privileges to operate on schema", "DB.X"),
            FetchError::PermissionDenied(_)
        ));
        assert!(matches!(classify_error("boom", "DB"), FetchError::QueryError(_)));
    }

    #[test]
    fn test_build_requires_database() {
        let result = SnowflakeConnector::new("account", "user", "pass")
            .with_warehouse("COMPUTE_WH")
            .build();
        assert!(matches!(result, Err(FetchError::ConfigError(msg)) if msg.contains("database")));
    }
}
