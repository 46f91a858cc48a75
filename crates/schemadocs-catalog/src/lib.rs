//! Backend connectors for schema documentation
//!
//! Each connector enumerates the schemas, tables and columns of one
//! configured database through the backend's own metadata views.
//!
//! ## Features
//!
//! Enable backend support via Cargo features:
//! - `bigquery` - Google BigQuery
//! - `duckdb` - DuckDB files and in-memory databases
//! - `databricks` - Databricks SQL warehouses (Unity Catalog)
//! - `snowflake` - Snowflake
//! - `postgres` - PostgreSQL/Redshift
//! - `all-backends` - All of the above
//!
//! Without a feature the matching connector still builds but every call
//! returns a [`FetchError::ConfigError`] naming the missing feature.
//!
//! ## Example
//!
//! ```rust,ignore
//! use schemadocs_catalog::{connect, Connector};
//! use schemadocs_core::DatabaseConfig;
//!
//! let mut config = DatabaseConfig::new("local", "duckdb");
//! config.path = Some("warehouse.duckdb".to_string());
//!
//! let connector = connect(&config).await?;
//! for schema in connector.list_schemas().await? {
//!     println!("{}: {:?}", schema, connector.list_tables(&schema).await?);
//! }
//! ```

pub mod bigquery;
pub mod connector;
pub mod databricks;
pub mod duckdb_connector;
pub mod mock;
pub mod postgres;
pub mod snowflake;

pub use bigquery::BigQueryConnector;
pub use connector::{connect, Connect, Connector, FetchError, TableIdentifier, WarehouseConnect};
pub use databricks::DatabricksConnector;
pub use duckdb_connector::DuckDbConnector;
pub use mock::{MockConnect, MockConnector, MockConnectorBuilder};
pub use postgres::PostgresConnector;
pub use snowflake::{SnowflakeConnector, SnowflakeConnectorBuilder};
