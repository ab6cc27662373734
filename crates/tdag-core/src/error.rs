//! Error taxonomy for the task graph.
//!
//! Graph operations never abort: every findable problem comes back as a
//! [`GraphError`] value. Storage failures ([`StoreError`]) are the only
//! errors an adapter is expected to treat as fatal for the current command.
//!
//! Every error maps onto a stable [`ErrorCode`] so adapters can print a
//! machine-readable code and a remediation hint without matching on variants.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::graph::consistency::Violation;
use crate::lock::LockError;
use crate::model::task::{Edge, ParseEnumError, TaskId};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalid,
    UnknownId,
    AmbiguousId,
    DuplicateId,
    EdgeNotFound,
    CycleDetected,
    InvalidTask,
    InvalidEnumValue,
    InconsistentGraph,
    CorruptSnapshot,
    StorageIo,
    LockContention,
    SqliteFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "E1001",
            Self::UnknownId => "E2001",
            Self::AmbiguousId => "E2002",
            Self::DuplicateId => "E2003",
            Self::EdgeNotFound => "E2004",
            Self::CycleDetected => "E2005",
            Self::InvalidTask => "E2006",
            Self::InvalidEnumValue => "E2007",
            Self::InconsistentGraph => "E3001",
            Self::CorruptSnapshot => "E3002",
            Self::StorageIo => "E5001",
            Self::LockContention => "E5002",
            Self::SqliteFailure => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "Invalid configuration",
            Self::UnknownId => "Task not found",
            Self::AmbiguousId => "Ambiguous task ID",
            Self::DuplicateId => "Task ID already exists",
            Self::EdgeNotFound => "Dependency edge not found",
            Self::CycleDetected => "Cycle would be created",
            Self::InvalidTask => "Invalid task",
            Self::InvalidEnumValue => "Invalid status value",
            Self::InconsistentGraph => "Inconsistent task graph",
            Self::CorruptSnapshot => "Corrupt task snapshot",
            Self::StorageIo => "Storage I/O failure",
            Self::LockContention => "Lock contention",
            Self::SqliteFailure => "SQLite failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid => Some("Fix ~/.tdag/config.toml or the TDAG_* environment variables."),
            Self::UnknownId => Some("Check the ID with `td list --archived all`."),
            Self::AmbiguousId => Some("Use a longer ID prefix to disambiguate."),
            Self::DuplicateId => Some("Pick a different --id or omit it to generate one."),
            Self::EdgeNotFound => Some("Inspect the task's links with `td deps <id>`."),
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::InvalidTask => None,
            Self::InvalidEnumValue => {
                Some("Use one of: pending, in_progress, done, requested, removed.")
            }
            Self::InconsistentGraph => Some("Run `td check` to list every finding."),
            Self::CorruptSnapshot => Some("Restore the data file from a backup or a `td export`."),
            Self::StorageIo => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `td` process releases its lock."),
            Self::SqliteFailure => Some("Retry once. If persistent, check the database file."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Structural problems rejected while constructing a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid task id '{raw}': {reason}")]
    InvalidId { raw: String, reason: &'static str },

    #[error("invalid timestamp '{raw}': expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD")]
    InvalidTimestamp { raw: String },

    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("task '{task}' lists '{related}' twice in {list}")]
    DuplicateReference {
        task: TaskId,
        related: TaskId,
        list: &'static str,
    },

    #[error("task '{task}' cannot depend on itself")]
    SelfLoop { task: TaskId },

    #[error(transparent)]
    InvalidEnum(#[from] ParseEnumError),
}

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Typed outcome of a failed graph operation.
///
/// A failed operation always leaves the graph exactly as it was before the
/// call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("cycle detected: adding {attempted_edge} would close {}", render_path(.path))]
    CycleDetected {
        attempted_edge: Edge,
        /// The closed loop, starting and ending at the edge source.
        path: Vec<TaskId>,
    },

    #[error("edge not found: {from} -> {to}")]
    EdgeNotFound { from: TaskId, to: TaskId },

    #[error("unknown task id '{id}'")]
    UnknownId { id: String },

    #[error("ambiguous task id '{prefix}': matches {}", render_ids(.matches))]
    AmbiguousId { prefix: String, matches: Vec<TaskId> },

    #[error("duplicate task id '{id}'")]
    DuplicateId { id: TaskId },

    #[error("inconsistent graph: {} finding(s)", .violations.len())]
    InconsistentGraph { violations: Vec<Violation> },

    #[error(transparent)]
    InvalidTask(#[from] ModelError),
}

impl GraphError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::EdgeNotFound { .. } => ErrorCode::EdgeNotFound,
            Self::UnknownId { .. } => ErrorCode::UnknownId,
            Self::AmbiguousId { .. } => ErrorCode::AmbiguousId,
            Self::DuplicateId { .. } => ErrorCode::DuplicateId,
            Self::InconsistentGraph { .. } => ErrorCode::InconsistentGraph,
            Self::InvalidTask(ModelError::InvalidEnum(_)) => ErrorCode::InvalidEnumValue,
            Self::InvalidTask(_) => ErrorCode::InvalidTask,
        }
    }

    pub(crate) fn unknown(id: impl fmt::Display) -> Self {
        Self::UnknownId { id: id.to_string() }
    }
}

fn render_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_ids(ids: &[TaskId]) -> String {
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The persisted snapshot could not be interpreted.
    #[error("corrupt snapshot at {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// A graph operation run through the store failed; nothing was saved.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::StorageIo,
            Self::Corrupt { .. } => ErrorCode::CorruptSnapshot,
            Self::Sqlite(_) => ErrorCode::SqliteFailure,
            Self::Lock(err) => err.code(),
            Self::Graph(err) => err.code(),
        }
    }

    /// The graph-level failure, when this error wraps one.
    #[must_use]
    pub const fn as_graph_error(&self) -> Option<&GraphError> {
        match self {
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, GraphError, ModelError};
    use crate::model::task::{Edge, TaskId};
    use std::collections::HashSet;

    fn id(raw: &str) -> TaskId {
        TaskId::new(raw).expect("valid id")
    }

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigInvalid,
            ErrorCode::UnknownId,
            ErrorCode::AmbiguousId,
            ErrorCode::DuplicateId,
            ErrorCode::EdgeNotFound,
            ErrorCode::CycleDetected,
            ErrorCode::InvalidTask,
            ErrorCode::InvalidEnumValue,
            ErrorCode::InconsistentGraph,
            ErrorCode::CorruptSnapshot,
            ErrorCode::StorageIo,
            ErrorCode::LockContention,
            ErrorCode::SqliteFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CycleDetected.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn cycle_message_renders_path() {
        let err = GraphError::CycleDetected {
            attempted_edge: Edge::new(id("b"), id("a")),
            path: vec![id("b"), id("a"), id("b")],
        };
        assert_eq!(
            err.to_string(),
            "cycle detected: adding b -> a would close b -> a -> b"
        );
        assert_eq!(err.code(), ErrorCode::CycleDetected);
    }

    #[test]
    fn invalid_task_maps_to_its_own_code() {
        let err = GraphError::from(ModelError::EmptyTitle);
        assert_eq!(err.code(), ErrorCode::InvalidTask);
    }

    #[test]
    fn ambiguous_lists_matches() {
        let err = GraphError::AmbiguousId {
            prefix: "ab".to_string(),
            matches: vec![id("abc"), id("abd")],
        };
        assert_eq!(err.to_string(), "ambiguous task id 'ab': matches abc, abd");
    }
}
