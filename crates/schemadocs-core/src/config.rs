//! Configuration schema (schemadocs.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::filter::TableFilter;
use crate::layout;

/// Default output directory, relative to the project root
pub const DEFAULT_OUTPUT_DIR: &str = "databases";

/// Identifier used for in-memory DuckDB databases
pub const DUCKDB_MEMORY_IDENTIFIER: &str = "memory";

/// Identifier used for Databricks when no catalog is configured
pub const DATABRICKS_DEFAULT_CATALOG: &str = "main";

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Google BigQuery (project / dataset / table)
    BigQuery,

    /// DuckDB file or in-memory database
    DuckDb,

    /// Databricks Unity Catalog (catalog / schema / table)
    Databricks,

    /// Snowflake (database / schema / table)
    Snowflake,

    /// PostgreSQL (database / schema / table)
    Postgres,
}

impl BackendType {
    /// Every supported backend
    pub const ALL: [BackendType; 5] = [
        Self::BigQuery,
        Self::DuckDb,
        Self::Databricks,
        Self::Snowflake,
        Self::Postgres,
    ];

    /// Name used in configuration and in `type=` output folders
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::DuckDb => "duckdb",
            Self::Databricks => "databricks",
            Self::Snowflake => "snowflake",
            Self::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One configured database backend
///
/// The `type` is kept as a raw string so that entries for unsupported
/// backends survive loading and can be reported and skipped at sync time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Display label
    pub name: String,

    /// Backend type (bigquery, duckdb, databricks, snowflake, postgres)
    #[serde(rename = "type")]
    pub database_type: String,

    /// BigQuery project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// BigQuery dataset restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,

    /// BigQuery service account key file (ADC when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// BigQuery location used for dataset discovery (e.g. `us`, `eu`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// DuckDB database file, or `:memory:`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Databricks catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Databricks / Snowflake schema restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Snowflake / PostgreSQL database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// PostgreSQL schema restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Use TLS for PostgreSQL connections
    #[serde(default)]
    pub tls: bool,

    /// Snowflake account locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Snowflake virtual warehouse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,

    /// Snowflake role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Databricks workspace host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_hostname: Option<String>,

    /// Databricks SQL warehouse HTTP path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,

    /// Databricks personal access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Glob patterns on `schema.table`; empty means include everything
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns on `schema.table`; always win over `include`
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Ordered accessor names; empty selects the defaults
    #[serde(default)]
    pub accessors: Vec<String>,
}

impl DatabaseConfig {
    /// Create a config entry with only a name and a type set
    pub fn new(name: impl Into<String>, database_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database_type: database_type.into(),
            project_id: None,
            dataset_id: None,
            credentials_path: None,
            location: None,
            path: None,
            catalog: None,
            schema: None,
            database: None,
            schema_name: None,
            host: None,
            port: None,
            user: None,
            password: None,
            tls: false,
            account: None,
            warehouse: None,
            role: None,
            server_hostname: None,
            http_path: None,
            access_token: None,
            include: Vec::new(),
            exclude: Vec::new(),
            accessors: Vec::new(),
        }
    }

    /// Parsed backend type, `None` when the type is not supported
    pub fn backend_type(&self) -> Option<BackendType> {
        self.database_type.parse().ok()
    }

    /// Backend type, or an error naming the unsupported type
    pub fn require_backend_type(&self) -> Result<BackendType, ConfigError> {
        self.backend_type().ok_or_else(|| ConfigError::UnsupportedType {
            database: self.name.clone(),
            database_type: self.database_type.clone(),
        })
    }

    /// Stable identifier of this database within its backend type
    ///
    /// This names the `database=` output folder and is the only derivation
    /// used by both sync and reconciliation.
    ///
    /// Identifiers that cannot be a single folder name are rejected, so both
    /// sides fail together instead of disagreeing on the path.
    pub fn identifier(&self) -> Result<String, ConfigError> {
        let identifier = match self.require_backend_type()? {
            BackendType::BigQuery => self.required("project_id", &self.project_id),
            BackendType::DuckDb => Ok(duckdb_identifier(self.path.as_deref())),
            BackendType::Databricks => Ok(self
                .catalog
                .clone()
                .unwrap_or_else(|| DATABRICKS_DEFAULT_CATALOG.to_string())),
            BackendType::Snowflake | BackendType::Postgres => {
                self.required("database", &self.database)
            }
        }?;

        if !layout::is_safe_segment(&identifier) {
            return Err(ConfigError::InvalidIdentifier {
                database: self.name.clone(),
                identifier,
            });
        }

        Ok(identifier)
    }

    /// Explicit schema/dataset restriction that short-circuits discovery
    pub fn schema_override(&self) -> Option<&str> {
        let value = match self.backend_type()? {
            BackendType::BigQuery => self.dataset_id.as_deref(),
            BackendType::DuckDb => None,
            BackendType::Databricks | BackendType::Snowflake => self.schema.as_deref(),
            BackendType::Postgres => self.schema_name.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Check a table against the include/exclude rules
    ///
    /// Patterns are compiled on every call; use [`TableFilter`] in loops.
    /// Invalid patterns never match, `validate` reports them.
    pub fn matches_pattern(&self, schema: &str, table: &str) -> bool {
        TableFilter::from_config(self)
            .map(|filter| filter.matches(schema, table))
            .unwrap_or(false)
    }

    /// Validate the backend type, locator and patterns of this entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identifier()?;
        TableFilter::from_config(self)?;
        Ok(())
    }

    fn required(&self, field: &'static str, value: &Option<String>) -> Result<String, ConfigError> {
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(ConfigError::MissingField {
                database: self.name.clone(),
                field,
            }),
        }
    }
}

/// DuckDB identifier: `memory` for in-memory databases, else the file stem
pub fn duckdb_identifier(path: Option<&str>) -> String {
    match path {
        None | Some(":memory:") | Some("") => DUCKDB_MEMORY_IDENTIFIER.to_string(),
        Some(path) => Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string()),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the generated documentation tree
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Configured databases, synced in order
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            databases: Vec::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Output directory resolved against the project root
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.project_root.join(&self.output_dir)
        }
    }

    /// Validate every database entry, returning the problems found
    pub fn validate(&self) -> Vec<ConfigError> {
        self.databases
            .iter()
            .filter_map(|db| db.validate().err())
            .collect()
    }
}

/// Config error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Database '{database}' is missing required field '{field}'")]
    MissingField {
        database: String,
        field: &'static str,
    },

    #[error("Database '{database}' has unsupported type '{database_type}'")]
    UnsupportedType {
        database: String,
        database_type: String,
    },

    #[error("Database '{database}' has identifier '{identifier}' that cannot name an output folder")]
    InvalidIdentifier {
        database: String,
        identifier: String,
    },

    #[error("Database '{database}' has invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        database: String,
        pattern: String,
        message: String,
    },

    #[error("Database '{database}' references unknown accessor '{accessor}'")]
    UnknownAccessor {
        database: String,
        accessor: String,
    },
}
