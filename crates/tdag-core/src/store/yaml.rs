//! YAML snapshot file backend.
//!
//! The file holds one document:
//!
//! ```yaml
//! version: 1
//! tasks:
//!   - id: ...
//!     title: ...
//! ```
//!
//! Tasks are written in id order. A save goes to `<file>.tmp`, is fsynced,
//! and is renamed over the target, so readers only ever see a complete
//! document. Writers serialize on the advisory lock `<file>.lock`.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Store, WriteGuard};
use crate::error::{GraphError, StoreError};
use crate::graph::TaskGraph;
use crate::lock::{StoreLock, DEFAULT_LOCK_TIMEOUT};
use crate::model::Task;

/// Snapshot document version written by this build.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentOut<'a> {
    version: u32,
    tasks: Vec<&'a Task>,
}

#[derive(Deserialize)]
struct DocumentIn {
    version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct YamlStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl YamlStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    #[must_use]
    pub fn with_lock_timeout(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            lock_timeout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parse a snapshot document. Empty input is an empty graph.
///
/// # Errors
///
/// [`StoreError::Corrupt`] for malformed YAML, an unknown version or
/// duplicate task ids.
pub fn parse_document(path: &Path, raw: &str) -> Result<TaskGraph, StoreError> {
    if raw.trim().is_empty() {
        return Ok(TaskGraph::new());
    }
    let doc: DocumentIn =
        serde_yaml::from_str(raw).map_err(|err| StoreError::corrupt(path, err))?;
    if doc.version != FORMAT_VERSION {
        return Err(StoreError::corrupt(
            path,
            format!("unsupported snapshot version {}", doc.version),
        ));
    }
    TaskGraph::from_tasks(doc.tasks).map_err(|err| match err {
        GraphError::DuplicateId { id } => {
            StoreError::corrupt(path, format!("duplicate task id {id}"))
        }
        other => StoreError::Graph(other),
    })
}

/// Render a graph as a snapshot document.
///
/// # Errors
///
/// [`StoreError::Corrupt`] if a task cannot be serialized.
pub fn render_document(path: &Path, graph: &TaskGraph) -> Result<String, StoreError> {
    let doc = DocumentOut {
        version: FORMAT_VERSION,
        tasks: graph.iter().collect(),
    };
    serde_yaml::to_string(&doc).map_err(|err| StoreError::corrupt(path, err))
}

impl Store for YamlStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<TaskGraph, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot yet, starting empty");
                return Ok(TaskGraph::new());
            }
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };

        let graph = parse_document(&self.path, &raw)?;
        super::warn_on_findings(&self.location(), &graph);
        Ok(graph)
    }

    fn save(&self, graph: &TaskGraph) -> Result<(), StoreError> {
        let rendered = render_document(&self.path, graph)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }

        let tmp = self.tmp_path();
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(rendered.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|err| StoreError::io(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| StoreError::io(&self.path, err))?;

        tracing::debug!(path = %self.path.display(), tasks = graph.len(), "wrote snapshot");
        Ok(())
    }

    fn lock(&self) -> Result<WriteGuard<'_>, StoreError> {
        let lock = StoreLock::acquire(&StoreLock::path_for(&self.path), self.lock_timeout)?;
        Ok(WriteGuard::File(lock))
    }
}
