//! schemadocs core
//!
//! Configuration model, table filtering, output layout and the column
//! metadata types shared by connectors and accessors.

pub mod config;
pub mod filter;
pub mod layout;
pub mod schema;

pub use config::{duckdb_identifier, BackendType, Config, ConfigError, DatabaseConfig};
pub use filter::TableFilter;
pub use schema::{Column, LogicalType, Nullability, Schema};
