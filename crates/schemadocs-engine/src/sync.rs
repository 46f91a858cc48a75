//! Sync orchestrator
//!
//! Walks every configured database in order and writes the documentation
//! tree:
//!
//! ```text
//! {base}/type={type}/database={identifier}/schema={schema}/table={table}/{file}
//! ```
//!
//! Work is strictly sequential. Failures are contained at the smallest unit
//! that lets siblings continue: a backend that cannot connect or list its
//! schemas is skipped, a schema whose tables cannot be listed is skipped, and
//! a failing accessor only loses its own file. Schema and table names that
//! cannot be a single folder name are skipped and reported.

use crate::accessors::resolve_accessors;
use crate::reporter::{Reporter, SyncEvent};
use crate::runner::run_accessors;
use schemadocs_catalog::{Connect, FetchError};
use schemadocs_core::{layout, BackendType, ConfigError, DatabaseConfig, TableFilter};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that abandon one backend
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Connection failed: {0}")]
    Connection(#[source] FetchError),

    #[error("Schema discovery failed: {0}")]
    Discovery(#[source] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a recorded failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureScope {
    /// The whole backend was skipped
    Backend,

    /// Tables of this schema could not be listed, or its name cannot be a
    /// folder
    Schema(String),

    /// A table whose name cannot be a folder
    Table { schema: String, table: String },

    /// One accessor failed for one table
    Accessor {
        schema: String,
        table: String,
        accessor: String,
    },
}

/// A failure that was reported and contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Configured database name
    pub database: String,
    pub scope: FailureScope,
    pub message: String,
}

/// Totals of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Schemas that had at least one table written
    pub schemas_synced: usize,

    /// Tables whose accessors all succeeded
    pub tables_synced: usize,

    /// Contained failures, in the order they happened
    pub failures: Vec<SyncFailure>,
}

impl SyncSummary {
    /// `(schemas_synced, tables_synced)`
    pub fn totals(&self) -> (usize, usize) {
        (self.schemas_synced, self.tables_synced)
    }

    /// Names of databases whose sync was abandoned
    pub fn failed_backends(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| f.scope == FailureScope::Backend)
            .map(|f| f.database.as_str())
            .collect()
    }

    /// True when nothing failed at any level
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Counts for one backend
#[derive(Debug, Default, Clone, Copy)]
struct BackendCounts {
    schemas: usize,
    tables: usize,
}

/// Sync every configured database under `base`
///
/// Never fails as a whole: problems are reported and recorded in the
/// returned summary.
pub async fn sync_databases(
    databases: &[DatabaseConfig],
    base: &Path,
    connect: &dyn Connect,
    reporter: &mut dyn Reporter,
) -> SyncSummary {
    let mut summary = SyncSummary::default();

    if databases.is_empty() {
        tracing::info!("no databases configured");
        return summary;
    }

    tracing::info!(base = %base.display(), count = databases.len(), "syncing databases");

    for db in databases {
        let Some(backend) = db.backend_type() else {
            tracing::warn!(database = %db.name, database_type = %db.database_type, "unsupported database type");
            reporter.event(SyncEvent::UnsupportedType {
                name: db.name.clone(),
                database_type: db.database_type.clone(),
            });
            continue;
        };

        match sync_database(db, backend, base, connect, reporter, &mut summary.failures).await {
            Ok(counts) => {
                tracing::info!(
                    database = %db.name,
                    schemas = counts.schemas,
                    tables = counts.tables,
                    "database synced"
                );
                summary.schemas_synced += counts.schemas;
                summary.tables_synced += counts.tables;
                reporter.event(SyncEvent::BackendFinished {
                    name: db.name.clone(),
                    schemas: counts.schemas,
                    tables: counts.tables,
                });
            }
            Err(err) => {
                tracing::warn!(database = %db.name, error = %err, "database sync failed");
                summary.failures.push(SyncFailure {
                    database: db.name.clone(),
                    scope: FailureScope::Backend,
                    message: err.to_string(),
                });
                reporter.event(SyncEvent::BackendFailed {
                    name: db.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    summary
}

/// Sync one backend; the only routine shared by all backend types
async fn sync_database(
    db: &DatabaseConfig,
    backend: BackendType,
    base: &Path,
    connect: &dyn Connect,
    reporter: &mut dyn Reporter,
    failures: &mut Vec<SyncFailure>,
) -> Result<BackendCounts, SyncError> {
    let accessors = resolve_accessors(db)?;
    let database_dir = base.join(layout::database_dir_for(db)?);
    let filter = TableFilter::from_config(db)?;

    reporter.event(SyncEvent::BackendStarted {
        name: db.name.clone(),
        backend,
        accessors: accessors.iter().map(|a| a.name().to_string()).collect(),
    });

    let connector = connect.connect(db).await.map_err(SyncError::Connection)?;

    let schemas = match db.schema_override() {
        Some(schema) => vec![schema.to_string()],
        None => connector.list_schemas().await.map_err(SyncError::Discovery)?,
    };

    let schema_task = reporter.begin_task(&db.name, schemas.len());
    let mut counts = BackendCounts::default();

    for schema in &schemas {
        if !layout::is_safe_segment(schema) {
            let error = format!("schema name {:?} cannot be used as a folder name", schema);
            tracing::warn!(database = %db.name, schema = %schema, "skipping schema with unsafe name");
            failures.push(SyncFailure {
                database: db.name.clone(),
                scope: FailureScope::Schema(schema.clone()),
                message: error.clone(),
            });
            reporter.event(SyncEvent::SchemaSkipped {
                name: db.name.clone(),
                schema: schema.clone(),
                error,
            });
            reporter.advance(schema_task);
            continue;
        }

        let tables = match connector.list_tables(schema).await {
            Ok(tables) => tables,
            Err(err) => {
                tracing::warn!(database = %db.name, schema = %schema, error = %err, "skipping schema");
                failures.push(SyncFailure {
                    database: db.name.clone(),
                    scope: FailureScope::Schema(schema.clone()),
                    message: err.to_string(),
                });
                reporter.event(SyncEvent::SchemaSkipped {
                    name: db.name.clone(),
                    schema: schema.clone(),
                    error: err.to_string(),
                });
                reporter.advance(schema_task);
                continue;
            }
        };

        let (tables, unsafe_tables): (Vec<String>, Vec<String>) = filter
            .filter_tables(schema, tables)
            .into_iter()
            .partition(|table| layout::is_safe_segment(table));

        for table in unsafe_tables {
            let error = format!("table name {:?} cannot be used as a folder name", table);
            tracing::warn!(database = %db.name, schema = %schema, table = %table, "skipping table with unsafe name");
            failures.push(SyncFailure {
                database: db.name.clone(),
                scope: FailureScope::Table {
                    schema: schema.clone(),
                    table: table.clone(),
                },
                message: error.clone(),
            });
            reporter.event(SyncEvent::TableSkipped {
                name: db.name.clone(),
                schema: schema.clone(),
                table,
                error,
            });
        }

        if tables.is_empty() {
            tracing::debug!(database = %db.name, schema = %schema, "no tables match, skipping schema");
            reporter.advance(schema_task);
            continue;
        }

        let schema_dir = database_dir.join(layout::schema_folder(schema));
        fs::create_dir_all(&schema_dir).map_err(|source| SyncError::Write {
            path: schema_dir.clone(),
            source,
        })?;
        counts.schemas += 1;

        let table_task = reporter.begin_task(&format!("  {}", schema), tables.len());

        for table in &tables {
            let table_dir = schema_dir.join(layout::table_folder(table));
            let outcome = run_accessors(connector.as_ref(), &accessors, schema, table, &table_dir).await?;

            for failure in &outcome.failures {
                failures.push(SyncFailure {
                    database: db.name.clone(),
                    scope: FailureScope::Accessor {
                        schema: schema.clone(),
                        table: table.clone(),
                        accessor: failure.accessor.to_string(),
                    },
                    message: failure.error.to_string(),
                });
                reporter.event(SyncEvent::AccessorFailed {
                    name: db.name.clone(),
                    schema: schema.clone(),
                    table: table.clone(),
                    accessor: failure.accessor.to_string(),
                    error: failure.error.to_string(),
                });
            }

            if outcome.is_complete() {
                counts.tables += 1;
            }

            tracing::debug!(
                database = %db.name,
                schema = %schema,
                table = %table,
                files = outcome.written.len(),
                "table synced"
            );
            reporter.advance(table_task);
        }

        reporter.advance(schema_task);
    }

    Ok(counts)
}
