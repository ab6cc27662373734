//! SQLite backend.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never block on the writer
//! - `busy_timeout = 5s` to ride out transient contention
//! - `foreign_keys = ON` so edge and tag rows follow their task
//!
//! `save` replaces every row inside one transaction. Writers additionally
//! serialize on the advisory lock `<file>.lock`, like the YAML backend.

pub mod migrations;
pub mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{Store, WriteGuard};
use crate::error::{GraphError, StoreError};
use crate::graph::TaskGraph;
use crate::lock::{StoreLock, DEFAULT_LOCK_TIMEOUT};
use crate::model::{Status, Task, TaskId, Timestamp};

/// Busy timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_TASKS_SQL: &str = "
SELECT id, title, description, priority, start_date, due_date, status, is_archived,
       assigned_to, requested_by, requested_at, requested_note, created_at, updated_at,
       metadata_json
FROM tasks
ORDER BY id";

const INSERT_TASK_SQL: &str = "
INSERT INTO tasks (
    id, title, description, priority, start_date, due_date, status, is_archived,
    assigned_to, requested_by, requested_at, requested_note, created_at, updated_at,
    metadata_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

/// Undirected reachability over both edge tables. Ids that do not name a
/// task are never entered, so two tasks sharing a dangling reference stay
/// apart.
const COMPONENT_SQL: &str = "
WITH RECURSIVE
    links(a, b) AS (
        SELECT task_id, parent_id FROM task_parents
        UNION ALL SELECT parent_id, task_id FROM task_parents
        UNION ALL SELECT task_id, child_id FROM task_children
        UNION ALL SELECT child_id, task_id FROM task_children
    ),
    reach(id) AS (
        SELECT ?1
        UNION
        SELECT links.b
        FROM reach
        JOIN links ON links.a = reach.id
        JOIN tasks ON tasks.id = links.b
    )
SELECT id FROM reach ORDER BY id";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl SqliteStore {
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

    /// Open (or create) the database, apply pragmas and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or SQLite fails.
    pub fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(conn)
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::corrupt(&self.path, reason)
    }

    fn parse_id(&self, raw: String) -> Result<TaskId, StoreError> {
        TaskId::new(raw).map_err(|err| self.corrupt(err))
    }

    fn parse_ts(&self, raw: Option<String>) -> Result<Option<Timestamp>, StoreError> {
        raw.map(|raw| Timestamp::parse(&raw).map_err(|err| self.corrupt(err)))
            .transpose()
    }

    fn required_ts(&self, raw: String) -> Result<Timestamp, StoreError> {
        Timestamp::parse(&raw).map_err(|err| self.corrupt(err))
    }

    fn read_tasks(&self, conn: &Connection) -> Result<BTreeMap<String, Task>, StoreError> {
        let mut stmt = conn.prepare(SELECT_TASKS_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok(TaskRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                priority: row.get(3)?,
                start_date: row.get(4)?,
                due_date: row.get(5)?,
                status: row.get(6)?,
                is_archived: row.get(7)?,
                assigned_to: row.get(8)?,
                requested_by: row.get(9)?,
                requested_at: row.get(10)?,
                requested_note: row.get(11)?,
                created_at: row.get(12)?,
                updated_at: row.get(13)?,
                metadata_json: row.get(14)?,
            })
        })?;

        let mut tasks = BTreeMap::new();
        for row in rows {
            let row = row?;
            let key = row.id.clone();
            let status: Status = row.status.parse().map_err(|err| self.corrupt(err))?;
            let metadata = serde_json::from_str(&row.metadata_json)
                .map_err(|err| self.corrupt(format!("metadata of {key}: {err}")))?;

            let mut task = Task::new(
                self.parse_id(row.id)?,
                row.title,
                self.required_ts(row.created_at)?,
            );
            task.description = row.description;
            task.priority = row.priority;
            task.start_date = self.parse_ts(row.start_date)?;
            task.due_date = self.parse_ts(row.due_date)?;
            task.status = status;
            task.is_archived = row.is_archived;
            task.assigned_to = row.assigned_to;
            task.requested_by = row.requested_by;
            task.requested_at = self.parse_ts(row.requested_at)?;
            task.requested_note = row.requested_note;
            task.updated_at = self.required_ts(row.updated_at)?;
            task.metadata = metadata;
            tasks.insert(key, task);
        }
        Ok(tasks)
    }

    /// `(task_id, other)` pairs in stored order.
    fn read_pairs(&self, conn: &Connection, sql: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn load_from(&self, conn: &Connection) -> Result<TaskGraph, StoreError> {
        let mut tasks = self.read_tasks(conn)?;

        let parents = self.read_pairs(
            conn,
            "SELECT task_id, parent_id FROM task_parents ORDER BY task_id, position",
        )?;
        for (task_id, parent) in parents {
            let parent = self.parse_id(parent)?;
            self.owner(&mut tasks, &task_id)?.depends_on.push(parent);
        }

        let children = self.read_pairs(
            conn,
            "SELECT task_id, child_id FROM task_children ORDER BY task_id, position",
        )?;
        for (task_id, child) in children {
            let child = self.parse_id(child)?;
            self.owner(&mut tasks, &task_id)?.children.push(child);
        }

        let tags = self.read_pairs(conn, "SELECT task_id, tag FROM task_tags ORDER BY task_id, tag")?;
        for (task_id, tag) in tags {
            self.owner(&mut tasks, &task_id)?.tags.insert(tag);
        }

        TaskGraph::from_tasks(tasks.into_values()).map_err(|err| match err {
            GraphError::DuplicateId { id } => self.corrupt(format!("duplicate task id {id}")),
            other => StoreError::Graph(other),
        })
    }

    fn owner<'t>(
        &self,
        tasks: &'t mut BTreeMap<String, Task>,
        task_id: &str,
    ) -> Result<&'t mut Task, StoreError> {
        tasks
            .get_mut(task_id)
            .ok_or_else(|| self.corrupt(format!("row references unknown task {task_id}")))
    }

    fn write_all(&self, conn: &mut Connection, graph: &TaskGraph) -> Result<(), StoreError> {
        let tx = conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM task_tags;
             DELETE FROM task_children;
             DELETE FROM task_parents;
             DELETE FROM tasks;",
        )?;
        {
            let mut insert_task = tx.prepare(INSERT_TASK_SQL)?;
            let mut insert_parent = tx.prepare(
                "INSERT INTO task_parents (task_id, position, parent_id) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_child = tx.prepare(
                "INSERT INTO task_children (task_id, position, child_id) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_tag = tx.prepare("INSERT INTO task_tags (task_id, tag) VALUES (?1, ?2)")?;

            for task in graph.iter() {
                let metadata = serde_json::to_string(&task.metadata).map_err(|err| self.corrupt(err))?;
                insert_task.execute(params![
                    task.id.as_str(),
                    task.title,
                    task.description,
                    task.priority,
                    task.start_date.map(|t| t.to_canonical()),
                    task.due_date.map(|t| t.to_canonical()),
                    task.status.as_str(),
                    task.is_archived,
                    task.assigned_to,
                    task.requested_by,
                    task.requested_at.map(|t| t.to_canonical()),
                    task.requested_note,
                    task.created_at.to_canonical(),
                    task.updated_at.to_canonical(),
                    metadata,
                ])?;
                for (position, parent) in task.depends_on.iter().enumerate() {
                    insert_parent.execute(params![task.id.as_str(), position, parent.as_str()])?;
                }
                for (position, child) in task.children.iter().enumerate() {
                    insert_child.execute(params![task.id.as_str(), position, child.as_str()])?;
                }
                for tag in &task.tags {
                    insert_tag.execute(params![task.id.as_str(), tag])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Exact id, else unique prefix, answered by the database.
    fn resolve_id(&self, conn: &Connection, raw: &str) -> Result<TaskId, StoreError> {
        let prefix = raw.trim();
        let exact: Option<String> = conn
            .query_row("SELECT id FROM tasks WHERE id = ?1", [prefix], |row| row.get(0))
            .optional()?;
        if let Some(id) = exact {
            return self.parse_id(id);
        }
        if prefix.is_empty() {
            return Err(GraphError::unknown(raw).into());
        }

        let mut stmt =
            conn.prepare("SELECT id FROM tasks WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id")?;
        let raw_matches = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut matches = raw_matches
            .into_iter()
            .map(|id| self.parse_id(id))
            .collect::<Result<Vec<_>, _>>()?;

        if matches.len() > 1 {
            return Err(GraphError::AmbiguousId {
                prefix: prefix.to_string(),
                matches,
            }
            .into());
        }
        matches
            .pop()
            .ok_or_else(|| GraphError::unknown(prefix).into())
    }
}

struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    priority: i64,
    start_date: Option<String>,
    due_date: Option<String>,
    status: String,
    is_archived: bool,
    assigned_to: Option<String>,
    requested_by: Option<String>,
    requested_at: Option<String>,
    requested_note: Option<String>,
    created_at: String,
    updated_at: String,
    metadata_json: String,
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

impl Store for SqliteStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<TaskGraph, StoreError> {
        let conn = self.open()?;
        let graph = self.load_from(&conn)?;
        super::warn_on_findings(&self.location(), &graph);
        Ok(graph)
    }

    fn save(&self, graph: &TaskGraph) -> Result<(), StoreError> {
        let mut conn = self.open()?;
        self.write_all(&mut conn, graph)?;
        tracing::debug!(path = %self.path.display(), tasks = graph.len(), "wrote snapshot");
        Ok(())
    }

    fn lock(&self) -> Result<WriteGuard<'_>, StoreError> {
        let lock = StoreLock::acquire(&StoreLock::path_for(&self.path), self.lock_timeout)?;
        Ok(WriteGuard::File(lock))
    }

    fn get_task(&self, id: &str) -> Result<Task, StoreError> {
        let conn = self.open()?;
        let id = self.resolve_id(&conn, id)?;
        let graph = self.load_from(&conn)?;
        Ok(graph.require(id.as_str())?.clone())
    }

    fn component(&self, id: &str) -> Result<BTreeSet<TaskId>, StoreError> {
        let conn = self.open()?;
        let seed = self.resolve_id(&conn, id)?;
        let mut stmt = conn.prepare(COMPONENT_SQL)?;
        let raw_ids = stmt
            .query_map([seed.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw_ids.into_iter().map(|raw| self.parse_id(raw)).collect()
    }
}
