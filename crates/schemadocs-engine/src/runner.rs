//! Accessor runner: writes every configured accessor's file for one table

use crate::accessors::Accessor;
use crate::sync::SyncError;
use schemadocs_catalog::{Connector, FetchError};
use std::fs;
use std::path::{Path, PathBuf};

/// An accessor that could not render its file
#[derive(Debug, Clone)]
pub struct AccessorFailure {
    pub accessor: &'static str,
    pub error: FetchError,
}

/// Result of running the accessors for one table
#[derive(Debug, Default)]
pub struct TableOutcome {
    /// Files fully rewritten, in accessor order
    pub written: Vec<PathBuf>,

    /// Accessors that failed; their previous files are left as they were
    pub failures: Vec<AccessorFailure>,
}

impl TableOutcome {
    /// True when every accessor produced its file
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Create `table_dir` and (re)write one file per accessor
///
/// A failing accessor does not stop the others. Filesystem errors do, and are
/// returned to the caller.
pub async fn run_accessors(
    connector: &dyn Connector,
    accessors: &[Box<dyn Accessor>],
    schema: &str,
    table: &str,
    table_dir: &Path,
) -> Result<TableOutcome, SyncError> {
    fs::create_dir_all(table_dir).map_err(|source| SyncError::Write {
        path: table_dir.to_path_buf(),
        source,
    })?;

    let mut outcome = TableOutcome::default();

    for accessor in accessors {
        match accessor.generate(connector, schema, table).await {
            Ok(content) => {
                let path = table_dir.join(accessor.filename());
                fs::write(&path, content).map_err(|source| SyncError::Write {
                    path: path.clone(),
                    source,
                })?;
                outcome.written.push(path);
            }
            Err(error) => {
                tracing::warn!(
                    accessor = accessor.name(),
                    schema,
                    table,
                    error = %error,
                    "accessor failed"
                );
                outcome.failures.push(AccessorFailure {
                    accessor: accessor.name(),
                    error,
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessors::{ColumnsAccessor, DescriptionAccessor};
    use schemadocs_catalog::{MockConnector, MockConnectorBuilder};
    use schemadocs_core::{Column, LogicalType, Schema};

    /// Accessor that always fails, to exercise isolation
    struct BrokenAccessor;

    #[async_trait::async_trait]
    impl Accessor for BrokenAccessor {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn filename(&self) -> &'static str {
            "broken.md"
        }

        async fn generate(
            &self,
            _connector: &dyn Connector,
            _schema: &str,
            _table: &str,
        ) -> Result<String, FetchError> {
            Err(FetchError::QueryError("boom".to_string()))
        }
    }

    fn connector() -> MockConnector {
        MockConnectorBuilder::new("memory")
            .with_table(
                "main",
                "users",
                Schema::from_columns(vec![Column::new("id", LogicalType::Int)]),
            )
            .build()
    }

    #[tokio::test]
    async fn test_writes_one_file_per_accessor() {
        let dir = tempfile::tempdir().unwrap();
        let table_dir = dir.path().join("schema=main").join("table=users");
        let accessors: Vec<Box<dyn Accessor>> = vec![Box::new(ColumnsAccessor), Box::new(DescriptionAccessor)];

        let outcome = run_accessors(&connector(), &accessors, "main", "users", &table_dir)
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(
            outcome.written,
            vec![table_dir.join("columns.md"), table_dir.join("description.md")]
        );
        assert!(fs::read_to_string(table_dir.join("columns.md")).unwrap().starts_with("# users"));
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let table_dir = dir.path().join("table=users");
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join("columns.md"), "stale content that is much longer than the new one".repeat(20)).unwrap();

        let accessors: Vec<Box<dyn Accessor>> = vec![Box::new(ColumnsAccessor)];
        run_accessors(&connector(), &accessors, "main", "users", &table_dir)
            .await
            .unwrap();

        let content = fs::read_to_string(table_dir.join("columns.md")).unwrap();
        assert!(!content.contains("stale"));
        assert!(content.contains("| 1 | id | INT | unknown |"));
    }

    #[tokio::test]
    async fn test_failing_accessor_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let table_dir = dir.path().join("table=users");
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join("broken.md"), "previous").unwrap();

        let accessors: Vec<Box<dyn Accessor>> = vec![
            Box::new(BrokenAccessor),
            Box::new(ColumnsAccessor),
        ];
        let outcome = run_accessors(&connector(), &accessors, "main", "users", &table_dir)
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].accessor, "broken");
        assert_eq!(outcome.written, vec![table_dir.join("columns.md")]);
        assert_eq!(fs::read_to_string(table_dir.join("broken.md")).unwrap(), "previous");
    }

    #[tokio::test]
    async fn test_write_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the table directory should go
        let blocked = dir.path().join("table=users");
        fs::write(&blocked, "not a directory").unwrap();

        let accessors: Vec<Box<dyn Accessor>> = vec![Box::new(ColumnsAccessor)];
        let result = run_accessors(&connector(), &accessors, "main", "users", &blocked).await;

        assert!(matches!(result, Err(SyncError::Write { path, .. }) if path == blocked));
    }
}
