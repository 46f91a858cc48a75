//! Progress and event reporting for sync runs
//!
//! The orchestrator and reconciler never print. They describe what happens
//! through an injected [`Reporter`], so the CLI can render a console view and
//! tests can record events.

use schemadocs_core::BackendType;
use std::fmt;
use std::path::PathBuf;

/// Handle of a progress task returned by [`Reporter::begin_task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

/// Something noteworthy that happened during a sync or clean
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A configured database is about to be synced
    BackendStarted {
        name: String,
        backend: BackendType,
        accessors: Vec<String>,
    },

    /// A configured database has a type no connector handles
    UnsupportedType { name: String, database_type: String },

    /// A whole backend was abandoned
    BackendFailed { name: String, error: String },

    /// A schema was skipped because its tables could not be listed
    SchemaSkipped {
        name: String,
        schema: String,
        error: String,
    },

    /// A table was skipped because its name cannot be a folder
    TableSkipped {
        name: String,
        schema: String,
        table: String,
        error: String,
    },

    /// One accessor failed for one table; its file was left untouched
    AccessorFailed {
        name: String,
        schema: String,
        table: String,
        accessor: String,
        error: String,
    },

    /// A configured database finished syncing
    BackendFinished {
        name: String,
        schemas: usize,
        tables: usize,
    },

    /// The reconciler deleted an unused output directory
    Removed { path: PathBuf },
}

impl SyncEvent {
    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SyncEvent::BackendFailed { .. }
                | SyncEvent::SchemaSkipped { .. }
                | SyncEvent::TableSkipped { .. }
                | SyncEvent::AccessorFailed { .. }
        )
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::BackendStarted { name, backend, accessors } => {
                write!(f, "{} ({}) accessors: {}", name, backend, accessors.join(", "))
            }
            SyncEvent::UnsupportedType { name, database_type } => {
                write!(f, "Unsupported database type '{}' for {}", database_type, name)
            }
            SyncEvent::BackendFailed { name, error } => {
                write!(f, "Failed to sync {}: {}", name, error)
            }
            SyncEvent::SchemaSkipped { name, schema, error } => {
                write!(f, "Skipped {}.{}: {}", name, schema, error)
            }
            SyncEvent::TableSkipped { name, schema, table, error } => {
                write!(f, "Skipped {}.{}.{}: {}", name, schema, table, error)
            }
            SyncEvent::AccessorFailed { name, schema, table, accessor, error } => {
                write!(f, "{} failed for {}.{}.{}: {}", accessor, name, schema, table, error)
            }
            SyncEvent::BackendFinished { name, schemas, tables } => {
                write!(f, "{}: {} schemas, {} tables", name, schemas, tables)
            }
            SyncEvent::Removed { path } => write!(f, "Removed unused {}", path.display()),
        }
    }
}

/// Receives progress and events from the engine
pub trait Reporter: Send {
    /// Start a progress task with a known number of steps
    fn begin_task(&mut self, label: &str, total: usize) -> TaskId;

    /// Complete one step of a task
    fn advance(&mut self, task: TaskId);

    /// Report an event
    fn event(&mut self, event: SyncEvent);
}

/// Reporter that forwards everything to `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter {
    next_task: usize,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for TracingReporter {
    fn begin_task(&mut self, label: &str, total: usize) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        tracing::debug!(task = id.0, total, "{}", label);
        id
    }

    fn advance(&mut self, task: TaskId) {
        tracing::trace!(task = task.0, "advance");
    }

    fn event(&mut self, event: SyncEvent) {
        match &event {
            SyncEvent::UnsupportedType { .. } => tracing::warn!("{}", event),
            _ if event.is_failure() => tracing::warn!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

/// A task as seen by [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTask {
    pub label: String,
    pub total: usize,
    pub advanced: usize,
}

/// Reporter that keeps everything in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub tasks: Vec<RecordedTask>,
    pub events: Vec<SyncEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events that report failures
    pub fn failures(&self) -> Vec<&SyncEvent> {
        self.events.iter().filter(|e| e.is_failure()).collect()
    }

    /// Paths reported as removed
    pub fn removed(&self) -> Vec<PathBuf> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::Removed { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn begin_task(&mut self, label: &str, total: usize) -> TaskId {
        self.tasks.push(RecordedTask {
            label: label.to_string(),
            total,
            advanced: 0,
        });
        TaskId(self.tasks.len() - 1)
    }

    fn advance(&mut self, task: TaskId) {
        if let Some(recorded) = self.tasks.get_mut(task.0) {
            recorded.advanced += 1;
        }
    }

    fn event(&mut self, event: SyncEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_tracks_progress() {
        let mut reporter = RecordingReporter::new();
        let first = reporter.begin_task("warehouse", 2);
        let second = reporter.begin_task("  public", 1);

        reporter.advance(first);
        reporter.advance(second);
        reporter.advance(first);

        assert_eq!(reporter.tasks[0].advanced, 2);
        assert_eq!(reporter.tasks[1].advanced, 1);
        assert_eq!(reporter.tasks[1].label, "  public");
    }

    #[test]
    fn test_failure_events() {
        let mut reporter = RecordingReporter::new();
        reporter.event(SyncEvent::BackendFinished {
            name: "a".to_string(),
            schemas: 1,
            tables: 2,
        });
        reporter.event(SyncEvent::SchemaSkipped {
            name: "a".to_string(),
            schema: "locked".to_string(),
            error: "denied".to_string(),
        });
        reporter.event(SyncEvent::Removed {
            path: PathBuf::from("databases/type=postgres"),
        });

        assert_eq!(reporter.failures().len(), 1);
        assert_eq!(reporter.removed(), vec![PathBuf::from("databases/type=postgres")]);
    }

    #[test]
    fn test_event_display() {
        let event = SyncEvent::AccessorFailed {
            name: "warehouse".to_string(),
            schema: "public".to_string(),
            table: "users".to_string(),
            accessor: "columns".to_string(),
            error: "timeout".to_string(),
        };
        assert_eq!(event.to_string(), "columns failed for warehouse.public.users: timeout");

        let event = SyncEvent::BackendStarted {
            name: "local".to_string(),
            backend: BackendType::DuckDb,
            accessors: vec!["columns".to_string(), "description".to_string()],
        };
        assert_eq!(event.to_string(), "local (duckdb) accessors: columns, description");
    }

    #[test]
    fn test_tracing_reporter_hands_out_distinct_tasks() {
        let mut reporter = TracingReporter::new();
        let first = reporter.begin_task("warehouse", 3);
        let second = reporter.begin_task("  public", 1);

        reporter.advance(first);
        reporter.event(SyncEvent::TableSkipped {
            name: "warehouse".to_string(),
            schema: "public".to_string(),
            table: "orders/2024".to_string(),
            error: "bad name".to_string(),
        });

        assert_eq!(first, TaskId(0));
        assert_eq!(second, TaskId(1));
    }
}
