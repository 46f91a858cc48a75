//! Databricks connector using the SQL Statement Execution API
//!
//! Statements run on a SQL warehouse through
//! `POST /api/2.0/sql/statements` and read Unity Catalog's
//! `information_schema`. One connector is bound to one catalog.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let connector = DatabricksConnector::new(
//!     "dbc-1234.cloud.databricks.com",
//!     "/sql/1.0/warehouses/abc123",
//!     token,
//!     "main",
//! )?;
//! let schemas = connector.list_schemas().await?;
//! ```
//!
//! Reference: https://docs.databricks.com/api/workspace/statementexecution

use crate::connector::{Connector, FetchError};
use schemadocs_core::{Column, LogicalType, Nullability, Schema};
use serde::{Deserialize, Serialize};

/// Polls of a still-running statement before giving up
#[cfg(feature = "databricks")]
const MAX_POLLS: u32 = 60;

/// Delay between polls
#[cfg(feature = "databricks")]
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Databricks connector bound to one catalog
pub struct DatabricksConnector {
    #[cfg(feature = "databricks")]
    client: reqwest::Client,

    /// `https://{server_hostname}`
    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    base_url: String,

    /// SQL warehouse extracted from the HTTP path
    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    warehouse_id: String,

    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    token: String,

    catalog: String,
}

impl DatabricksConnector {
    /// Create a connector from the workspace host, warehouse HTTP path and token
    pub fn new(
        server_hostname: impl Into<String>,
        http_path: &str,
        token: impl Into<String>,
        catalog: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let warehouse_id = Self::warehouse_id_from_http_path(http_path)?;
        let host = server_hostname.into();
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        Ok(Self {
            #[cfg(feature = "databricks")]
            client: reqwest::Client::new(),
            base_url,
            warehouse_id,
            token: token.into(),
            catalog: catalog.into(),
        })
    }

    /// Extract the warehouse id from `/sql/1.0/warehouses/{id}`
    pub fn warehouse_id_from_http_path(http_path: &str) -> Result<String, FetchError> {
        let mut segments = http_path.split('/').filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            if segment == "warehouses" || segment == "endpoints" {
                if let Some(id) = segments.next() {
                    return Ok(id.to_string());
                }
            }
        }

        Err(FetchError::ConfigError(format!(
            "Databricks http_path '{}' does not name a SQL warehouse (expected /sql/1.0/warehouses/<id>)",
            http_path
        )))
    }

    /// Convert Databricks type to LogicalType
    pub fn map_databricks_type(db_type: &str) -> LogicalType {
        let trimmed = db_type.trim();
        let base_type = trimmed.split(['(', '<'])
            .next()
            .unwrap_or(trimmed)
            .trim()
            .to_uppercase();

        match base_type.as_str() {
            "BOOLEAN" => LogicalType::Bool,

            "TINYINT" | "BYTE" | "SMALLINT" | "SHORT" | "INT" | "INTEGER" | "BIGINT" | "LONG" => {
                LogicalType::Int
            }

            "FLOAT" | "REAL" | "DOUBLE" => LogicalType::Float,

            "DECIMAL" | "DEC" | "NUMERIC" => match crate::connector::parse_precision_scale(trimmed) {
                Some((precision, scale)) => LogicalType::Decimal { precision, scale },
                None => LogicalType::Decimal {
                    precision: Some(10),
                    scale: Some(0),
                },
            },

            "STRING" | "VARCHAR" | "CHAR" => LogicalType::String,
            "BINARY" => LogicalType::Bytes,

            "DATE" => LogicalType::Date,
            "TIMESTAMP" | "TIMESTAMP_NTZ" => LogicalType::Timestamp,

            "VARIANT" => LogicalType::Json,

            "ARRAY" => {
                let element = trimmed
                    .find('<')
                    .zip(trimmed.rfind('>'))
                    .filter(|(start, end)| start < end)
                    .map(|(start, end)| Self::map_databricks_type(&trimmed[start + 1..end]))
                    .unwrap_or_else(|| LogicalType::Other("ANY".to_string()));
                LogicalType::Array {
                    element_type: Box::new(element),
                }
            }

            "STRUCT" => LogicalType::Struct { fields: vec![] },

            _ => LogicalType::Other(trimmed.to_string()),
        }
    }

    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    fn catalog_ident(&self) -> String {
        format!("`{}`", self.catalog.replace('`', "``"))
    }

    #[cfg(feature = "databricks")]
    async fn execute(
        &self,
        statement: &str,
        parameters: Vec<StatementParameter<'_>>,
    ) -> Result<Vec<Vec<Option<String>>>, FetchError> {
        let request = StatementRequest {
            statement,
            warehouse_id: &self.warehouse_id,
            catalog: &self.catalog,
            wait_timeout: "30s",
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
            parameters,
        };

        let url = format!("{}/api/2.0/sql/statements", self.base_url);
        let response = self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(format!("Databricks request failed: {}", e)))?;

        let mut statement_response = Self::read_response(response).await?;

        let mut polls = 0;
        while statement_response.status.is_running() {
            if polls >= MAX_POLLS {
                return Err(FetchError::QueryError(format!(
                    "Statement {} did not finish in time",
                    statement_response.statement_id
                )));
            }
            polls += 1;
            tokio::time::sleep(POLL_INTERVAL).await;

            let url = format!(
                "{}/api/2.0/sql/statements/{}",
                self.base_url, statement_response.statement_id
            );
            let response = self.client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| FetchError::NetworkError(format!("Databricks request failed: {}", e)))?;
            statement_response = Self::read_response(response).await?;
        }

        statement_response.status.check()?;

        let mut rows = Vec::new();
        let mut next = statement_response.result;
        while let Some(chunk) = next.take() {
            rows.extend(chunk.data_array);

            if let Some(link) = chunk.next_chunk_internal_link {
                let url = format!("{}{}", self.base_url, link);
                let response = self.client
                    .get(&url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(|e| FetchError::NetworkError(format!("Databricks request failed: {}", e)))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(classify_http_status(status.as_u16(), "result chunk"));
                }
                let chunk: ResultData = response
                    .json()
                    .await
                    .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
                next = Some(chunk);
            }
        }

        Ok(rows)
    }

    #[cfg(feature = "databricks")]
    async fn read_response(response: reqwest::Response) -> Result<StatementResponse, FetchError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_status(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::InvalidResponse(format!("Unexpected statement response: {}", e)))
    }

    #[cfg(feature = "databricks")]
    async fn query_names(
        &self,
        statement: &str,
        parameters: Vec<StatementParameter<'_>>,
    ) -> Result<Vec<String>, FetchError> {
        let rows = self.execute(statement, parameters).await?;
        Ok(first_column(rows))
    }
}

#[cfg(not(feature = "databricks"))]
fn feature_disabled() -> FetchError {
    FetchError::ConfigError(
        "Databricks support not compiled. Rebuild with: cargo build --features databricks".to_string()
    )
}

/// Request body of `POST /api/2.0/sql/statements`
#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    catalog: &'a str,
    wait_timeout: &'static str,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter<'a>>,
}

/// Named `:marker` parameter of a statement
#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Serialize)]
struct StatementParameter<'a> {
    name: &'static str,
    value: &'a str,
    #[serde(rename = "type")]
    param_type: &'static str,
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
impl<'a> StatementParameter<'a> {
    fn string(name: &'static str, value: &'a str) -> Self {
        Self {
            name,
            value,
            param_type: "STRING",
        }
    }
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    result: Option<ResultData>,
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
#[derive(Debug, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

impl StatementStatus {
    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    fn is_running(&self) -> bool {
        matches!(self.state.as_str(), "PENDING" | "RUNNING")
    }

    /// Map a terminal state to success or the matching error
    #[cfg_attr(not(feature = "databricks"), allow(dead_code))]
    fn check(&self) -> Result<(), FetchError> {
        if self.state == "SUCCEEDED" {
            return Ok(());
        }

        let message = self
            .error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| format!("statement {}", self.state.to_lowercase()));
        let code = self
            .error
            .as_ref()
            .and_then(|e| e.error_code.clone())
            .unwrap_or_default();

        Err(if message.contains("SCHEMA_NOT_FOUND") {
            FetchError::SchemaNotFound(message)
        } else if message.contains("TABLE_OR_VIEW_NOT_FOUND") {
            FetchError::TableNotFound(message)
        } else if code == "PERMISSION_DENIED" || message.contains("PERMISSION_DENIED") {
            FetchError::PermissionDenied(message)
        } else {
            FetchError::QueryError(message)
        })
    }
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
fn classify_http_status(status: u16, body: &str) -> FetchError {
    match status {
        401 => FetchError::AuthenticationError(format!("Databricks rejected the access token: {}", body)),
        403 => FetchError::PermissionDenied(body.to_string()),
        404 => FetchError::ConfigError(format!("Databricks endpoint not found: {}", body)),
        _ => FetchError::NetworkError(format!("Databricks returned HTTP {}: {}", status, body)),
    }
}

#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
fn first_column(rows: Vec<Vec<Option<String>>>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect()
}

/// Build columns from `column_name, full_data_type, is_nullable, comment` rows
#[cfg_attr(not(feature = "databricks"), allow(dead_code))]
fn rows_to_columns(rows: Vec<Vec<Option<String>>>) -> Vec<Column> {
    rows.into_iter()
        .filter_map(|row| {
            let mut values = row.into_iter();
            let name = values.next().flatten()?;
            let data_type = values.next().flatten().unwrap_or_default();
            let is_nullable = values.next().flatten().unwrap_or_default();
            let comment = values.next().flatten();

            let mut column = Column::new(name, DatabricksConnector::map_databricks_type(&data_type))
                .with_nullability(Nullability::from_is_nullable(&is_nullable));
            if let Some(comment) = comment {
                column = column.with_description(comment);
            }
            Some(column)
        })
        .collect()
}

#[async_trait::async_trait]
impl Connector for DatabricksConnector {
    fn name(&self) -> &'static str {
        "Databricks"
    }

    fn database(&self) -> &str {
        &self.catalog
    }

    #[cfg(feature = "databricks")]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        let statement = format!(
            "SELECT schema_name FROM {}.information_schema.schemata \
             WHERE schema_name <> 'information_schema' ORDER BY schema_name",
            self.catalog_ident()
        );
        self.query_names(&statement, Vec::new()).await
    }

    #[cfg(not(feature = "databricks"))]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "databricks")]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        let statement = format!(
            "SELECT table_name FROM {}.information_schema.tables \
             WHERE table_schema = :schema ORDER BY table_name",
            self.catalog_ident()
        );
        self.query_names(&statement, vec![StatementParameter::string("schema", schema)]).await
    }

    #[cfg(not(feature = "databricks"))]
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "databricks")]
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        let statement = format!(
            "SELECT column_name, full_data_type, is_nullable, comment \
             FROM {}.information_schema.columns \
             WHERE table_schema = :schema AND table_name = :table \
             ORDER BY ordinal_position",
            self.catalog_ident()
        );
        let rows = self
            .execute(
                &statement,
                vec![
                    StatementParameter::string("schema", schema),
                    StatementParameter::string("table", table),
                ],
            )
            .await?;

        let columns = rows_to_columns(rows);
        if columns.is_empty() {
            return Err(FetchError::TableNotFound(format!(
                "Table {} not found or has no columns",
                self.table_identifier(schema, table).fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    #[cfg(not(feature = "databricks"))]
    async fn fetch_schema(&self, _schema: &str, _table: &str) -> Result<Schema, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "databricks")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.execute("SELECT 1", Vec::new()).await.map(|_| ())
    }

    #[cfg(not(feature = "databricks"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(feature_disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_id_from_http_path() {
        assert_eq!(
            DatabricksConnector::warehouse_id_from_http_path("/sql/1.0/warehouses/abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            DatabricksConnector::warehouse_id_from_http_path("/sql/1.0/endpoints/def456/").unwrap(),
            "def456"
        );
        assert!(DatabricksConnector::warehouse_id_from_http_path("/sql/protocolv1/o/1/0101").is_err());
    }

    #[test]
    fn test_new_normalizes_host() {
        let connector = DatabricksConnector::new(
            "dbc-1234.cloud.databricks.com/",
            "/sql/1.0/warehouses/abc123",
            "token",
            "main",
        )
        .unwrap();
        assert_eq!(connector.base_url, "https://dbc-1234.cloud.databricks.com");
        assert_eq!(connector.warehouse_id, "abc123");
        assert_eq!(connector.database(), "main");
        assert_eq!(connector.catalog_ident(), "`main`");
    }

    #[test]
    fn test_type_mapping() {
        assert!(matches!(DatabricksConnector::map_databricks_type("bigint"), LogicalType::Int));
        assert!(matches!(DatabricksConnector::map_databricks_type("string"), LogicalType::String));
        assert!(matches!(DatabricksConnector::map_databricks_type("timestamp_ntz"), LogicalType::Timestamp));
        assert!(matches!(DatabricksConnector::map_databricks_type("struct<a:int>"), LogicalType::Struct { .. }));
        assert_eq!(
            DatabricksConnector::map_databricks_type("decimal(12,4)"),
            LogicalType::Decimal { precision: Some(12), scale: Some(4) }
        );
        assert_eq!(
            DatabricksConnector::map_databricks_type("array<string>"),
            LogicalType::Array { element_type: Box::new(LogicalType::String) }
        );
    }

    #[test]
    fn test_statement_request_shape() {
        let request = StatementRequest {
            statement: "SELECT 1",
            warehouse_id: "abc123",
            catalog: "main",
            wait_timeout: "30s",
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
            parameters: vec![StatementParameter::string("schema", "bronze")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["warehouse_id"], "abc123");
        assert_eq!(json["parameters"][0]["name"], "schema");
        assert_eq!(json["parameters"][0]["type"], "STRING");
    }

    #[test]
    fn test_parse_succeeded_response() {
        let response: StatementResponse = serde_json::from_str(
            r#"{
                "statement_id": "01ef",
                "status": {"state": "SUCCEEDED"},
                "result": {"data_array": [["bronze"], ["silver"], [null]]}
            }"#,
        )
        .unwrap();

        assert!(response.status.check().is_ok());
        let rows = response.result.unwrap().data_array;
        assert_eq!(first_column(rows), vec!["bronze".to_string(), "silver".to_string()]);
    }

    #[test]
    fn test_failed_status_classification() {
        let status: StatementStatus = serde_json::from_str(
            r#"{"state": "FAILED", "error": {"error_code": "BAD_REQUEST",
                "message": "[SCHEMA_NOT_FOUND] The schema `gold` cannot be found."}}"#,
        )
        .unwrap();
        assert!(matches!(status.check(), Err(FetchError::SchemaNotFound(_))));

        let status: StatementStatus = serde_json::from_str(r#"{"state": "CANCELED"}"#).unwrap();
        assert!(matches!(status.check(), Err(FetchError::QueryError(msg)) if msg.contains("canceled")));
    }

    #[test]
    fn test_rows_to_columns() {
        let columns = rows_to_columns(vec![
            vec![
                Some("id".to_string()),
                Some("bigint".to_string()),
                Some("NO".to_string()),
                None,
            ],
            vec![
                Some("email".to_string()),
                Some("string".to_string()),
                Some("YES".to_string()),
                Some("Login address".to_string()),
            ],
        ]);

        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].nullable, Nullability::No);
        assert_eq!(columns[1].description.as_deref(), Some("Login address"));
    }

    #[test]
    fn test_http_status_classification() {
        assert!(matches!(classify_http_status(401, ""), FetchError::AuthenticationError(_)));
        assert!(matches!(classify_http_status(403, ""), FetchError::PermissionDenied(_)));
        assert!(matches!(classify_http_status(503, ""), FetchError::NetworkError(_)));
    }
}
