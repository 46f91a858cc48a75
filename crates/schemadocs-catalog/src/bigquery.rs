//! BigQuery connector using INFORMATION_SCHEMA views
//!
//! Datasets are discovered from `INFORMATION_SCHEMA.SCHEMATA`, tables from the
//! dataset's `INFORMATION_SCHEMA.TABLES` and columns from
//! `INFORMATION_SCHEMA.COLUMNS`. It requires appropriate IAM permissions:
//! - bigquery.datasets.get
//! - bigquery.tables.list
//! - bigquery.tables.get
//!
//! Authentication uses `credentials_path` when configured and falls back to
//! Application Default Credentials.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let connector = BigQueryConnector::connect("my-project", None).await?;
//! let datasets = connector.list_schemas().await?;
//! ```
//!
//! Reference: https://cloud.google.com/bigquery/docs/information-schema-intro

use crate::connector::{quote_literal, Connector, FetchError};
use schemadocs_core::{LogicalType, Schema};

#[cfg(feature = "bigquery")]
use schemadocs_core::{Column, Nullability};

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{model::query_request::QueryRequest, Client as BigQueryClient};

/// BigQuery connector bound to one project
pub struct BigQueryConnector {
    /// Project ID
    project_id: String,

    /// Location qualifier for project-level views (e.g. `us`, `eu`)
    location: Option<String>,

    /// BigQuery client (only available with bigquery feature)
    #[cfg(feature = "bigquery")]
    client: BigQueryClient,
}

impl BigQueryConnector {
    /// Authenticate against `project_id`
    ///
    /// With `credentials` the service-account key at that path is used,
    /// otherwise Application Default Credentials (`GOOGLE_APPLICATION_CREDENTIALS`,
    /// gcloud login or the metadata server).
    #[cfg(feature = "bigquery")]
    pub async fn connect(
        project_id: impl Into<String>,
        credentials: Option<&std::path::Path>,
    ) -> Result<Self, FetchError> {
        let client = match credentials {
            Some(path) => BigQueryClient::from_service_account_key_file(&path.to_string_lossy())
                .await
                .map_err(|e| {
                    FetchError::AuthenticationError(format!("key file {}: {}", path.display(), e))
                })?,
            None => BigQueryClient::from_application_default_credentials()
                .await
                .map_err(|e| {
                    FetchError::AuthenticationError(format!(
                        "no usable default credentials ({}); set credentials_path or \
                         run 'gcloud auth application-default login'",
                        e
                    ))
                })?,
        };

        Ok(Self {
            project_id: project_id.into(),
            location: None,
            client,
        })
    }

    #[cfg(not(feature = "bigquery"))]
    pub async fn connect(
        _project_id: impl Into<String>,
        _credentials: Option<&std::path::Path>,
    ) -> Result<Self, FetchError> {
        Err(feature_disabled())
    }

    /// Qualify project-level views with a location
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location.filter(|l| !l.is_empty());
        self
    }

    /// Project-level SCHEMATA view, region qualified when a location is set
    #[cfg_attr(not(feature = "bigquery"), allow(dead_code))]
    fn schemata_view(&self) -> String {
        match &self.location {
            Some(location) => format!(
                "`{}`.`region-{}`.INFORMATION_SCHEMA.SCHEMATA",
                self.project_id,
                location.to_lowercase()
            ),
            None => format!("`{}`.INFORMATION_SCHEMA.SCHEMATA", self.project_id),
        }
    }

    #[cfg_attr(not(feature = "bigquery"), allow(dead_code))]
    fn tables_query(&self, dataset: &str) -> String {
        format!(
            "SELECT table_name FROM `{}.{}`.INFORMATION_SCHEMA.TABLES ORDER BY table_name",
            self.project_id, dataset
        )
    }

    #[cfg_attr(not(feature = "bigquery"), allow(dead_code))]
    fn columns_query(&self, dataset: &str, table: &str) -> String {
        format!(
            r#"
            SELECT
                column_name,
                data_type,
                is_nullable
            FROM `{}.{}`.INFORMATION_SCHEMA.COLUMNS
            WHERE table_name = {}
            ORDER BY ordinal_position
            "#,
            self.project_id,
            dataset,
            quote_literal(table)
        )
    }

    /// Convert BigQuery type to LogicalType
    pub fn map_bigquery_type(bq_type: &str) -> LogicalType {
        // Handle parameterized types like NUMERIC(10,2) or ARRAY<STRING>
        let base_type = bq_type.split('(').next()
            .unwrap_or(bq_type)
            .split('<').next()
            .unwrap_or(bq_type)
            .trim()
            .to_uppercase();

        match base_type.as_str() {
            "BOOL" | "BOOLEAN" => LogicalType::Bool,

            "INT64" | "INTEGER" | "INT" | "SMALLINT" | "TINYINT" | "BYTEINT" | "BIGINT" => LogicalType::Int,

            "FLOAT64" | "FLOAT" => LogicalType::Float,

            "NUMERIC" | "BIGNUMERIC" | "DECIMAL" | "BIGDECIMAL" => Self::parse_numeric_type(bq_type),

            "STRING" => LogicalType::String,
            "BYTES" => LogicalType::Bytes,

            "DATE" => LogicalType::Date,
            "DATETIME" | "TIMESTAMP" | "TIME" => LogicalType::Timestamp,

            "JSON" => LogicalType::Json,

            "ARRAY" => LogicalType::Array {
                element_type: Box::new(Self::extract_array_element_type(bq_type)),
            },

            "STRUCT" | "RECORD" => LogicalType::Struct { fields: vec![] },

            _ => LogicalType::Other(bq_type.trim().to_string()),
        }
    }

    /// Parse NUMERIC(precision, scale) type
    fn parse_numeric_type(type_str: &str) -> LogicalType {
        match crate::connector::parse_precision_scale(type_str) {
            Some((precision, scale)) => LogicalType::Decimal { precision, scale },
            // Default for NUMERIC without parameters
            None => LogicalType::Decimal {
                precision: Some(38),
                scale: Some(9),
            },
        }
    }

    /// Extract element type from ARRAY<TYPE>
    fn extract_array_element_type(type_str: &str) -> LogicalType {
        if let (Some(start), Some(end)) = (type_str.find('<'), type_str.rfind('>')) {
            if start < end {
                return Self::map_bigquery_type(&type_str[start + 1..end]);
            }
        }
        LogicalType::Other(type_str.to_string())
    }

    #[cfg(feature = "bigquery")]
    async fn run_query(
        &self,
        query: String,
    ) -> Result<gcp_bigquery_client::model::query_response::ResultSet, FetchError> {
        let request = QueryRequest::new(query);
        let response = self.client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("Not found") {
                    FetchError::SchemaNotFound(err_str)
                } else if err_str.contains("Access Denied") || err_str.contains("Permission") {
                    FetchError::PermissionDenied(err_str)
                } else {
                    FetchError::QueryError(err_str)
                }
            })?;

        Ok(gcp_bigquery_client::model::query_response::ResultSet::new_from_query_response(response))
    }

    #[cfg(feature = "bigquery")]
    async fn query_names(&self, query: String, column: &str) -> Result<Vec<String>, FetchError> {
        let mut rs = self.run_query(query).await?;
        let mut names = Vec::new();

        while rs.next_row() {
            if let Some(name) = string_field(&rs, column)? {
                names.push(name);
            }
        }

        Ok(names)
    }
}

#[cfg(feature = "bigquery")]
fn string_field(
    rs: &gcp_bigquery_client::model::query_response::ResultSet,
    column: &str,
) -> Result<Option<String>, FetchError> {
    rs.get_string_by_name(column)
        .map_err(|e| FetchError::InvalidResponse(format!("column {} missing from result: {}", column, e)))
}

#[cfg(not(feature = "bigquery"))]
fn feature_disabled() -> FetchError {
    FetchError::ConfigError(
        "BigQuery support not compiled. Rebuild with: cargo build --features bigquery".to_string()
    )
}

#[async_trait::async_trait]
impl Connector for BigQueryConnector {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    fn database(&self) -> &str {
        &self.project_id
    }

    #[cfg(feature = "bigquery")]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        let query = format!(
            "SELECT schema_name FROM {} ORDER BY schema_name",
            self.schemata_view()
        );
        self.query_names(query, "schema_name").await
    }

    #[cfg(not(feature = "bigquery"))]
    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "bigquery")]
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        self.query_names(self.tables_query(schema), "table_name").await
    }

    #[cfg(not(feature = "bigquery"))]
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "bigquery")]
    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        let table_id = self.table_identifier(schema, table);
        let mut rs = self.run_query(self.columns_query(schema, table)).await?;
        let mut columns = Vec::new();

        while rs.next_row() {
            let name = string_field(&rs, "column_name")?.unwrap_or_default();
            let data_type = string_field(&rs, "data_type")?.unwrap_or_else(|| "UNKNOWN".to_string());
            let nullable = string_field(&rs, "is_nullable")?.unwrap_or_default();

            columns.push(
                Column::new(name, Self::map_bigquery_type(&data_type))
                    .with_nullability(Nullability::from_is_nullable(&nullable)),
            );
        }

        if columns.is_empty() {
            return Err(FetchError::TableNotFound(format!(
                "Table {} not found or has no columns",
                table_id.fqn()
            )));
        }

        Ok(Schema::from_columns(columns))
    }

    #[cfg(not(feature = "bigquery"))]
    async fn fetch_schema(&self, _schema: &str, _table: &str) -> Result<Schema, FetchError> {
        Err(feature_disabled())
    }

    #[cfg(feature = "bigquery")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.run_query("SELECT 1".to_string())
            .await
            .map_err(|e| FetchError::NetworkError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "bigquery"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(feature_disabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert!(matches!(BigQueryConnector::map_bigquery_type("INT64"), LogicalType::Int));
        assert!(matches!(BigQueryConnector::map_bigquery_type("STRING"), LogicalType::String));
        assert!(matches!(BigQueryConnector::map_bigquery_type("BOOL"), LogicalType::Bool));
        assert!(matches!(BigQueryConnector::map_bigquery_type("TIMESTAMP"), LogicalType::Timestamp));
        assert!(matches!(BigQueryConnector::map_bigquery_type("JSON"), LogicalType::Json));
        assert!(matches!(BigQueryConnector::map_bigquery_type("FLOAT64"), LogicalType::Float));
        assert!(matches!(BigQueryConnector::map_bigquery_type("BYTES"), LogicalType::Bytes));
    }

    #[test]
    fn test_numeric_type_parsing() {
        assert_eq!(
            BigQueryConnector::map_bigquery_type("NUMERIC(10,2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(
            BigQueryConnector::map_bigquery_type("BIGNUMERIC"),
            LogicalType::Decimal { precision: Some(38), scale: Some(9) }
        );
    }

    #[test]
    fn test_array_type_parsing() {
        match BigQueryConnector::map_bigquery_type("ARRAY<STRING>") {
            LogicalType::Array { element_type } => {
                assert!(matches!(*element_type, LogicalType::String));
            }
            other => panic!("Expected Array type, got {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_type_keeps_native_name() {
        assert_eq!(
            BigQueryConnector::map_bigquery_type("GEOGRAPHY"),
            LogicalType::Other("GEOGRAPHY".to_string())
        );
    }

    #[test]
    #[cfg(not(feature = "bigquery"))]
    fn test_discovery_queries() {
        let connector = BigQueryConnector {
            project_id: "project1".to_string(),
            location: None,
        };
        assert_eq!(connector.schemata_view(), "`project1`.INFORMATION_SCHEMA.SCHEMATA");
        assert!(connector.tables_query("analytics").contains("`project1.analytics`.INFORMATION_SCHEMA.TABLES"));
        assert!(connector.columns_query("analytics", "o'rders").contains("'o''rders'"));

        let connector = connector.with_location(Some("EU".to_string()));
        assert_eq!(connector.schemata_view(), "`project1`.`region-eu`.INFORMATION_SCHEMA.SCHEMATA");
        assert_eq!(connector.database(), "project1");
    }

    #[tokio::test]
    #[cfg(not(feature = "bigquery"))]
    async fn test_connector_requires_feature() {
        let result = BigQueryConnector::connect("my-project", None).await;
        assert!(matches!(result, Err(FetchError::ConfigError(msg)) if msg.contains("--features bigquery")));
    }
}
