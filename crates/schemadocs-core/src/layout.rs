//! Output tree layout
//!
//! `type={type}/database={id}/schema={schema}/table={table}/{file}`
//!
//! Sync and reconciliation both name folders through these functions; a
//! divergence would make the reconciler delete freshly synced output.

use std::path::PathBuf;

use crate::config::{BackendType, ConfigError, DatabaseConfig};

pub const TYPE_PREFIX: &str = "type=";
pub const DATABASE_PREFIX: &str = "database=";
pub const SCHEMA_PREFIX: &str = "schema=";
pub const TABLE_PREFIX: &str = "table=";

/// Whether `name` can be used as one folder name below a `key=` prefix
///
/// Separators, `.`/`..`, NUL and empty names would change the depth of the
/// tree or leave it.
pub fn is_safe_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(&['/', '\\', '\0'][..])
}

/// `type={backend}` folder name
pub fn type_folder(backend: BackendType) -> String {
    format!("{}{}", TYPE_PREFIX, backend.as_str())
}

/// `database={identifier}` folder name
pub fn database_folder(identifier: &str) -> String {
    format!("{}{}", DATABASE_PREFIX, identifier)
}

/// `schema={schema}` folder name
pub fn schema_folder(schema: &str) -> String {
    format!("{}{}", SCHEMA_PREFIX, schema)
}

/// `table={table}` folder name
pub fn table_folder(table: &str) -> String {
    format!("{}{}", TABLE_PREFIX, table)
}

/// Relative path of a backend type directory
pub fn type_dir(backend: BackendType) -> PathBuf {
    PathBuf::from(type_folder(backend))
}

/// Relative path of a database directory
pub fn database_dir(backend: BackendType, identifier: &str) -> PathBuf {
    type_dir(backend).join(database_folder(identifier))
}

/// Relative path of a schema directory
pub fn schema_dir(backend: BackendType, identifier: &str, schema: &str) -> PathBuf {
    database_dir(backend, identifier).join(schema_folder(schema))
}

/// Relative path of a table directory
pub fn table_dir(backend: BackendType, identifier: &str, schema: &str, table: &str) -> PathBuf {
    schema_dir(backend, identifier, schema).join(table_folder(table))
}

/// Relative database directory of a configured entry
pub fn database_dir_for(config: &DatabaseConfig) -> Result<PathBuf, ConfigError> {
    let backend = config.require_backend_type()?;
    Ok(database_dir(backend, &config.identifier()?))
}
