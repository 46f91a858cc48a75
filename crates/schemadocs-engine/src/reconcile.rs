//! Reconciler: prunes output that no configured database produces
//!
//! Only the `type=` and `database=` levels are checked. Schema and table
//! directories left behind inside a configured database are not removed.

use crate::reporter::{Reporter, SyncEvent};
use schemadocs_core::{layout, ConfigError, DatabaseConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that stop a clean
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Refusing to clean output: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to clean {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a clean removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Removed directories, in removal order
    pub removed: Vec<PathBuf>,
}

/// `type=` folder -> `database=` folders that current configuration produces
///
/// Entries with an unsupported type are skipped. A supported entry whose
/// identifier cannot be derived is an error.
pub fn valid_database_folders(
    databases: &[DatabaseConfig],
) -> Result<BTreeMap<String, BTreeSet<String>>, ConfigError> {
    let mut valid: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for db in databases {
        let Some(backend) = db.backend_type() else {
            continue;
        };
        let identifier = db.identifier()?;
        valid
            .entry(layout::type_folder(backend))
            .or_default()
            .insert(layout::database_folder(&identifier));
    }

    Ok(valid)
}

/// Delete every `type=` and `database=` directory under `root` that the
/// configuration does not produce
///
/// Works from configuration alone and never connects to a backend. Files
/// directly under `root` or a type directory are left alone. A missing
/// `root` is not an error.
pub fn remove_unused_databases(
    databases: &[DatabaseConfig],
    root: &Path,
    reporter: &mut dyn Reporter,
) -> Result<ReconcileReport, ReconcileError> {
    let valid = valid_database_folders(databases)?;
    let mut report = ReconcileReport::default();

    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "output root missing, nothing to clean");
        return Ok(report);
    }

    for type_dir in child_dirs(root)? {
        let type_name = folder_name(&type_dir);

        let Some(valid_databases) = valid.get(&type_name) else {
            remove_dir(&type_dir, reporter, &mut report)?;
            continue;
        };

        for db_dir in child_dirs(&type_dir)? {
            if !valid_databases.contains(&folder_name(&db_dir)) {
                remove_dir(&db_dir, reporter, &mut report)?;
            }
        }
    }

    Ok(report)
}

/// Child directories of `dir`, sorted by name; files and symlinks are skipped
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>, ReconcileError> {
    let io_err = |source| ReconcileError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn remove_dir(
    path: &Path,
    reporter: &mut dyn Reporter,
    report: &mut ReconcileReport,
) -> Result<(), ReconcileError> {
    fs::remove_dir_all(path).map_err(|source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "removed unused output");
    reporter.event(SyncEvent::Removed {
        path: path.to_path_buf(),
    });
    report.removed.push(path.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;

    fn bigquery(project: &str) -> DatabaseConfig {
        let mut config = DatabaseConfig::new("warehouse", "bigquery");
        config.project_id = Some(project.to_string());
        config
    }

    #[test]
    fn test_valid_database_folders() {
        let mut duck = DatabaseConfig::new("local", "duckdb");
        duck.path = Some("data/shop.duckdb".to_string());
        let legacy = DatabaseConfig::new("legacy", "oracle");

        let valid = valid_database_folders(&[bigquery("project1"), duck, legacy]).unwrap();

        assert_eq!(valid.len(), 2);
        assert!(valid["type=bigquery"].contains("database=project1"));
        assert!(valid["type=duckdb"].contains("database=shop"));
    }

    #[test]
    fn test_missing_identifier_refuses_to_clean() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("type=postgres/database=appdb")).unwrap();

        let broken = DatabaseConfig::new("warehouse", "bigquery");
        let mut reporter = RecordingReporter::new();
        let result = remove_unused_databases(&[broken], dir.path(), &mut reporter);

        assert!(matches!(result, Err(ReconcileError::Config(ConfigError::MissingField { .. }))));
        assert!(dir.path().join("type=postgres/database=appdb").is_dir());
    }

    #[test]
    fn test_missing_root_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = RecordingReporter::new();

        let report =
            remove_unused_databases(&[bigquery("project1")], &dir.path().join("absent"), &mut reporter)
                .unwrap();

        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "notes").unwrap();
        fs::create_dir_all(dir.path().join("type=bigquery")).unwrap();
        fs::write(dir.path().join("type=bigquery/index.md"), "index").unwrap();

        let mut reporter = RecordingReporter::new();
        let report = remove_unused_databases(&[bigquery("project1")], dir.path(), &mut reporter).unwrap();

        assert!(report.removed.is_empty());
        assert!(dir.path().join("README.md").is_file());
        assert!(dir.path().join("type=bigquery/index.md").is_file());
    }

    #[test]
    fn test_removals_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("type=bigquery/database=old_project/schema=a")).unwrap();
        fs::create_dir_all(dir.path().join("type=bigquery/database=project1")).unwrap();

        let mut reporter = RecordingReporter::new();
        let report = remove_unused_databases(&[bigquery("project1")], dir.path(), &mut reporter).unwrap();

        let expected = vec![dir.path().join("type=bigquery/database=old_project")];
        assert_eq!(report.removed, expected);
        assert_eq!(reporter.removed(), expected);
    }
}
