//! In-memory connector for testing
//!
//! [`MockConnector`] serves predefined schemas and tables without touching a
//! backend, and can simulate failures at each stage a real connection can
//! fail: connecting, listing schemas, listing tables and fetching columns.
//! [`MockConnect`] hands out mock connectors by configured database name so
//! the sync orchestrator can be driven end to end.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schemadocs_catalog::{Connector, MockConnectorBuilder};
//! use schemadocs_core::{Column, LogicalType, Schema};
//!
//! let connector = MockConnectorBuilder::new("analytics")
//!     .with_table("public", "users", Schema::from_columns(vec![
//!         Column::new("id", LogicalType::Int),
//!     ]))
//!     .build();
//!
//! let tables = connector.list_tables("public").await?;
//! ```

use crate::connector::{Connect, Connector, FetchError};
use schemadocs_core::{DatabaseConfig, Schema};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type Tables = BTreeMap<String, BTreeMap<String, Schema>>;

/// Mock connector backed by an in-memory catalog
///
/// Clones share the same catalog, so tables added through one handle are
/// visible through every other.
#[derive(Clone)]
pub struct MockConnector {
    /// schema -> table -> columns
    tables: Arc<RwLock<Tables>>,

    /// Errors returned by `list_tables` for a schema
    schema_errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Errors returned by `fetch_schema`, keyed by `schema.table`
    table_errors: Arc<RwLock<HashMap<String, FetchError>>>,

    fail_connection: bool,

    fail_discovery: bool,

    /// Simulated query latency (milliseconds)
    latency_ms: u64,

    connector_name: &'static str,

    database: String,
}

impl MockConnector {
    /// Create an empty mock connector bound to `database`
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(BTreeMap::new())),
            schema_errors: Arc::new(RwLock::new(HashMap::new())),
            table_errors: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            fail_discovery: false,
            latency_ms: 0,
            connector_name: "Mock",
            database: database.into(),
        }
    }

    /// Add a table, creating its schema if needed
    pub async fn add_table(&self, schema: &str, table: &str, columns: Schema) {
        self.tables
            .write()
            .await
            .entry(schema.to_string())
            .or_default()
            .insert(table.to_string(), columns);
    }

    /// Add a schema with no tables
    pub async fn add_empty_schema(&self, schema: &str) {
        self.tables.write().await.entry(schema.to_string()).or_default();
    }

    /// Remove a table; the schema stays even if it becomes empty
    pub async fn remove_table(&self, schema: &str, table: &str) {
        if let Some(tables) = self.tables.write().await.get_mut(schema) {
            tables.remove(table);
        }
    }

    /// Make `list_tables` fail for one schema
    pub async fn add_error_for_schema(&self, schema: &str, error: FetchError) {
        self.schema_errors.write().await.insert(schema.to_string(), error);
    }

    /// Make `fetch_schema` fail for one table
    pub async fn add_error_for_table(&self, schema: &str, table: &str, error: FetchError) {
        self.table_errors
            .write()
            .await
            .insert(format!("{}.{}", schema, table), error);
    }

    /// Fail `test_connection`
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Fail `list_schemas`
    pub fn with_discovery_failure(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Delay every call by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Report a custom connector name, e.g. to impersonate a backend
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.connector_name = name;
        self
    }

    /// Number of tables across all schemas
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.values().map(BTreeMap::len).sum()
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &'static str {
        self.connector_name
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn list_schemas(&self) -> Result<Vec<String>, FetchError> {
        self.simulate_latency().await;

        if self.fail_discovery {
            return Err(FetchError::QueryError(format!(
                "Simulated discovery failure for {}",
                self.database
            )));
        }

        Ok(self.tables.read().await.keys().cloned().collect())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, FetchError> {
        self.simulate_latency().await;

        if let Some(error) = self.schema_errors.read().await.get(schema) {
            return Err(error.clone());
        }

        self.tables
            .read()
            .await
            .get(schema)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| FetchError::SchemaNotFound(format!("{}.{}", self.database, schema)))
    }

    async fn fetch_schema(&self, schema: &str, table: &str) -> Result<Schema, FetchError> {
        self.simulate_latency().await;

        if let Some(error) = self.table_errors.read().await.get(&format!("{}.{}", schema, table)) {
            return Err(error.clone());
        }

        self.tables
            .read()
            .await
            .get(schema)
            .and_then(|tables| tables.get(table))
            .cloned()
            .ok_or_else(|| FetchError::TableNotFound(self.table_identifier(schema, table).fqn()))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(FetchError::NetworkError("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Builder for a [`MockConnector`] with a prepared catalog
pub struct MockConnectorBuilder {
    database: String,
    tables: Tables,
    schema_errors: HashMap<String, FetchError>,
    table_errors: HashMap<String, FetchError>,
    fail_connection: bool,
    fail_discovery: bool,
    connector_name: &'static str,
}

impl MockConnectorBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: BTreeMap::new(),
            schema_errors: HashMap::new(),
            table_errors: HashMap::new(),
            fail_connection: false,
            fail_discovery: false,
            connector_name: "Mock",
        }
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: Schema) -> Self {
        self.tables
            .entry(schema.to_string())
            .or_default()
            .insert(table.to_string(), columns);
        self
    }

    pub fn with_empty_schema(mut self, schema: &str) -> Self {
        self.tables.entry(schema.to_string()).or_default();
        self
    }

    pub fn with_schema_error(mut self, schema: &str, error: FetchError) -> Self {
        self.tables.entry(schema.to_string()).or_default();
        self.schema_errors.insert(schema.to_string(), error);
        self
    }

    pub fn with_table_error(mut self, schema: &str, table: &str, error: FetchError) -> Self {
        self.tables
            .entry(schema.to_string())
            .or_default()
            .entry(table.to_string())
            .or_insert_with(Schema::new);
        self.table_errors.insert(format!("{}.{}", schema, table), error);
        self
    }

    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn with_discovery_failure(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.connector_name = name;
        self
    }

    pub fn build(self) -> MockConnector {
        MockConnector {
            tables: Arc::new(RwLock::new(self.tables)),
            schema_errors: Arc::new(RwLock::new(self.schema_errors)),
            table_errors: Arc::new(RwLock::new(self.table_errors)),
            fail_connection: self.fail_connection,
            fail_discovery: self.fail_discovery,
            latency_ms: 0,
            connector_name: self.connector_name,
            database: self.database,
        }
    }
}

/// [`Connect`] implementation that hands out mock connectors by config name
///
/// Every attempt is recorded so tests can assert processing order.
#[derive(Clone, Default)]
pub struct MockConnect {
    connectors: HashMap<String, MockConnector>,
    failures: HashMap<String, FetchError>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockConnect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `connector` for the database configured as `name`
    pub fn with_connector(mut self, name: impl Into<String>, connector: MockConnector) -> Self {
        self.connectors.insert(name.into(), connector);
        self
    }

    /// Fail to connect to the database configured as `name`
    pub fn with_failure(mut self, name: impl Into<String>, error: FetchError) -> Self {
        self.failures.insert(name.into(), error);
        self
    }

    /// Config names in the order connections were requested
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Connect for MockConnect {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connector>, FetchError> {
        self.attempts.lock().await.push(config.name.clone());

        if let Some(error) = self.failures.get(&config.name) {
            return Err(error.clone());
        }

        let connector = self.connectors.get(&config.name).cloned().ok_or_else(|| {
            FetchError::ConfigError(format!("No mock connector registered for '{}'", config.name))
        })?;

        connector.test_connection().await?;
        Ok(Box::new(connector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadocs_core::{Column, LogicalType, Nullability};

    fn users() -> Schema {
        Schema::from_columns(vec![
            Column::new("id", LogicalType::Int).with_nullability(Nullability::No),
            Column::new("email", LogicalType::String),
        ])
    }

    #[tokio::test]
    async fn test_mock_connector_listing() {
        let connector = MockConnectorBuilder::new("analytics")
            .with_table("sales", "orders", users())
            .with_table("public", "users", users())
            .with_empty_schema("staging")
            .build();

        assert_eq!(
            connector.list_schemas().await.unwrap(),
            vec!["public", "sales", "staging"]
        );
        assert_eq!(connector.list_tables("public").await.unwrap(), vec!["users"]);
        assert!(connector.list_tables("staging").await.unwrap().is_empty());
        assert_eq!(connector.database(), "analytics");
    }

    #[tokio::test]
    async fn test_mock_connector_fetch_schema() {
        let connector = MockConnector::new("analytics");
        connector.add_table("public", "users", users()).await;

        let fetched = connector.fetch_schema("public", "users").await.unwrap();
        assert_eq!(fetched.column_names(), vec!["id", "email"]);
        assert_eq!(fetched.columns[0].nullable, Nullability::No);

        let missing = connector.fetch_schema("public", "ghosts").await;
        assert!(matches!(missing, Err(FetchError::TableNotFound(msg)) if msg == "analytics.public.ghosts"));
    }

    #[tokio::test]
    async fn test_mock_connector_unknown_schema() {
        let connector = MockConnector::new("analytics");
        let result = connector.list_tables("nope").await;
        assert!(matches!(result, Err(FetchError::SchemaNotFound(_))));
    }

    #[tokio::test]
    async fn test_mock_connector_simulated_errors() {
        let connector = MockConnectorBuilder::new("analytics")
            .with_schema_error("locked", FetchError::PermissionDenied("no usage".to_string()))
            .with_table_error("public", "secret", FetchError::PermissionDenied("no select".to_string()))
            .build();

        assert!(matches!(connector.list_tables("locked").await, Err(FetchError::PermissionDenied(_))));
        assert_eq!(connector.list_tables("public").await.unwrap(), vec!["secret"]);
        assert!(matches!(
            connector.fetch_schema("public", "secret").await,
            Err(FetchError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_connector_failures() {
        let connector = MockConnector::new("db").with_connection_failure();
        assert!(matches!(connector.test_connection().await, Err(FetchError::NetworkError(_))));

        let connector = MockConnector::new("db").with_discovery_failure();
        assert!(connector.test_connection().await.is_ok());
        assert!(matches!(connector.list_schemas().await, Err(FetchError::QueryError(_))));
    }

    #[tokio::test]
    async fn test_mock_connector_shared_state() {
        let connector = MockConnector::new("db");
        let cloned = connector.clone();

        connector.add_table("public", "a", users()).await;
        connector.add_table("public", "b", users()).await;
        assert_eq!(cloned.table_count().await, 2);

        cloned.remove_table("public", "a").await;
        assert_eq!(connector.list_tables("public").await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_mock_connector_name() {
        assert_eq!(MockConnector::new("db").name(), "Mock");
        assert_eq!(MockConnector::new("db").with_name("TestBigQuery").name(), "TestBigQuery");
    }

    #[tokio::test]
    async fn test_mock_connect_dispatch() {
        let connect = MockConnect::new()
            .with_connector("warehouse", MockConnector::new("analytics"))
            .with_connector("down", MockConnector::new("x").with_connection_failure())
            .with_failure("denied", FetchError::AuthenticationError("bad key".to_string()));

        let ok = connect.connect(&DatabaseConfig::new("warehouse", "postgres")).await.unwrap();
        assert_eq!(ok.database(), "analytics");

        assert!(matches!(
            connect.connect(&DatabaseConfig::new("denied", "bigquery")).await,
            Err(FetchError::AuthenticationError(_))
        ));
        assert!(matches!(
            connect.connect(&DatabaseConfig::new("down", "duckdb")).await,
            Err(FetchError::NetworkError(_))
        ));
        assert!(matches!(
            connect.connect(&DatabaseConfig::new("unknown", "duckdb")).await,
            Err(FetchError::ConfigError(_))
        ));

        assert_eq!(connect.attempts().await, vec!["warehouse", "denied", "down", "unknown"]);
    }
}
