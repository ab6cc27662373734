//! JSON import and export of whole snapshots.
//!
//! The exchange format is one JSON object keyed by task id:
//!
//! ```json
//! { "<id>": { "id": "<id>", "title": "...", ... }, ... }
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::StoreError;
use crate::graph::TaskGraph;
use crate::model::Task;
use crate::ops;

/// Render a graph in the exchange format, keys in id order.
///
/// # Errors
///
/// [`StoreError::Corrupt`] if a task cannot be serialized.
pub fn to_json(graph: &TaskGraph) -> Result<String, StoreError> {
    let keyed: BTreeMap<&str, &Task> = graph.iter().map(|t| (t.id.as_str(), t)).collect();
    serde_json::to_string_pretty(&keyed).map_err(|err| StoreError::corrupt("<export>", err))
}

/// Write an export file. Refuses to overwrite an existing file.
///
/// # Errors
///
/// [`StoreError::Io`] when the file exists or cannot be written.
pub fn export_file(graph: &TaskGraph, path: &Path) -> Result<usize, StoreError> {
    let rendered = to_json(graph)?;
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| StoreError::io(path, err))?;
    let write = || -> std::io::Result<()> {
        let mut out = BufWriter::new(file);
        out.write_all(rendered.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    };
    write().map_err(|err| StoreError::io(path, err))?;
    tracing::info!(path = %path.display(), tasks = graph.len(), "exported snapshot");
    Ok(graph.len())
}

/// Parse and validate an exchange document.
///
/// The graph must pass the full check: consistent edges and no cycles.
///
/// # Errors
///
/// - [`StoreError::Corrupt`] for malformed JSON or a key that differs from
///   its task's id.
/// - [`StoreError::Graph`] wrapping `InconsistentGraph` when the check fails.
pub fn from_json(source: &Path, raw: &str) -> Result<TaskGraph, StoreError> {
    let keyed: BTreeMap<String, Task> =
        serde_json::from_str(raw).map_err(|err| StoreError::corrupt(source, err))?;
    if let Some((key, task)) = keyed.iter().find(|(key, task)| key.as_str() != task.id.as_str()) {
        return Err(StoreError::corrupt(
            source,
            format!("key {key} holds task {}", task.id),
        ));
    }
    let graph = TaskGraph::from_tasks(keyed.into_values())?;
    ops::ensure_valid(&graph)?;
    Ok(graph)
}

/// Read and validate an export file.
///
/// # Errors
///
/// See [`from_json`]; also [`StoreError::Io`] when the file cannot be read.
pub fn import_file(path: &Path) -> Result<TaskGraph, StoreError> {
    let raw = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
    let graph = from_json(path, &raw)?;
    tracing::info!(path = %path.display(), tasks = graph.len(), "parsed import file");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::graph::test_support::{graph, id};

    #[test]
    fn export_then_import_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("b").unwrap().tags.insert("t".to_string());

        assert_eq!(export_file(&g, &path).unwrap(), 2);
        assert_eq!(import_file(&path).unwrap(), g);
    }

    #[test]
    fn export_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, "keep me").unwrap();
        assert!(matches!(
            export_file(&graph(&["a"], &[]), &path),
            Err(StoreError::Io { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn export_is_keyed_by_id() {
        let json = to_json(&graph(&["a"], &[])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["a"]["title"], "task a");
    }

    #[test]
    fn import_rejects_mismatched_key() {
        let json = to_json(&graph(&["a"], &[])).unwrap().replacen("\"a\":", "\"b\":", 1);
        assert!(matches!(
            from_json(Path::new("in.json"), &json),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn import_rejects_inconsistent_graph() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("b").unwrap().depends_on.clear();
        let json = to_json(&g).unwrap();

        match from_json(Path::new("in.json"), &json) {
            Err(StoreError::Graph(GraphError::InconsistentGraph { violations })) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].task(), Some(&id("a")));
            }
            other => panic!("expected inconsistency, got {other:?}"),
        }
    }

    #[test]
    fn import_rejects_cycles() {
        let json = to_json(&graph(&["a", "b"], &[("a", "b"), ("b", "a")])).unwrap();
        assert!(matches!(
            from_json(Path::new("in.json"), &json),
            Err(StoreError::Graph(GraphError::InconsistentGraph { .. }))
        ));
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(matches!(
            from_json(Path::new("in.json"), "[1, 2"),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
