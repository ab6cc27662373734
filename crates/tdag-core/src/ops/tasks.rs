//! Task-level operations: add, update, status, request, remove, delete.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::txn::GraphTxn;
use super::{ensure_acyclic, fresh_id, OpsContext};
use crate::error::{GraphError, ModelError};
use crate::graph::{cycles, TaskGraph};
use crate::model::{Edge, Status, Task, TaskDraft, TaskId, Timestamp};

/// Prefix stored in front of every delegation note.
pub const REQUEST_NOTE_PREFIX: &str = "[request-note]";

/// Insert a new task and link it to its requested parents and children.
///
/// # Errors
///
/// - [`GraphError::DuplicateId`] when the requested id is taken.
/// - [`GraphError::InvalidTask`] for an empty title or malformed links.
/// - [`GraphError::UnknownId`] when a parent or child does not exist.
/// - [`GraphError::CycleDetected`] when the requested links close a loop.
pub fn add_task(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    draft: TaskDraft,
) -> Result<TaskId, GraphError> {
    let now = ctx.now();
    let id = fresh_id(graph, ctx, now, draft.id.clone())?;
    let (task, parents, children) = draft.into_task(id.clone(), now)?;

    let mut txn = GraphTxn::begin(graph, now);
    txn.insert_task(task)?;
    let added = link_all(&mut txn, &id, &parents, &children)?;
    ensure_acyclic(txn.graph(), &added)?;
    txn.commit();

    tracing::debug!(%id, parents = parents.len(), children = children.len(), "added task");
    Ok(id)
}

/// Link `id` under every parent and above every child, returning the edges
/// that were actually added.
pub(super) fn link_all(
    txn: &mut GraphTxn<'_>,
    id: &TaskId,
    parents: &[TaskId],
    children: &[TaskId],
) -> Result<Vec<Edge>, GraphError> {
    let mut added = Vec::new();
    for parent in parents {
        let parent = txn.graph().require(parent.as_str())?.id.clone();
        if txn.add_edge(&parent, id)? {
            added.push(Edge::new(parent, id.clone()));
        }
    }
    for child in children {
        let child = txn.graph().require(child.as_str())?.id.clone();
        if txn.add_edge(id, &child)? {
            added.push(Edge::new(id.clone(), child));
        }
    }
    Ok(added)
}

/// Field changes for [`update_task`]. `None` leaves a field alone; the nested
/// `Option` on clearable fields distinguishes "set" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<i64>,
    pub start_date: Option<Option<Timestamp>>,
    pub due_date: Option<Option<Timestamp>>,
    pub status: Option<Status>,
    pub assigned_to: Option<Option<String>>,
    pub requested_by: Option<Option<String>>,
    pub requested_at: Option<Option<Timestamp>>,
    pub requested_note: Option<Option<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    /// `Some` sets a key, `None` removes it.
    pub metadata: BTreeMap<String, Option<serde_json::Value>>,
    pub add_parents: Vec<TaskId>,
    pub remove_parents: Vec<TaskId>,
    pub add_children: Vec<TaskId>,
    pub remove_children: Vec<TaskId>,
}

impl TaskPatch {
    /// Whether the patch changes anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.start_date.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.assigned_to.is_none()
            && self.requested_by.is_none()
            && self.requested_at.is_none()
            && self.requested_note.is_none()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
            && self.metadata.is_empty()
            && self.add_parents.is_empty()
            && self.remove_parents.is_empty()
            && self.add_children.is_empty()
            && self.remove_children.is_empty()
    }
}

/// Apply a patch in one transaction.
///
/// Link removals run before additions, so a patch can move a task from one
/// parent to another. Any failure rolls back the whole patch.
///
/// # Errors
///
/// - [`GraphError::UnknownId`] when `id` or a linked id does not exist.
/// - [`GraphError::EdgeNotFound`] when a link to remove is absent.
/// - [`GraphError::InvalidTask`] for an empty title.
/// - [`GraphError::CycleDetected`] when new links or a revived status close
///   a loop.
pub fn update_task(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    id: &str,
    patch: TaskPatch,
) -> Result<(), GraphError> {
    let id = graph.require(id)?.id.clone();
    if patch.is_empty() {
        return Ok(());
    }
    let mut txn = GraphTxn::begin(graph, ctx.now());

    {
        let task = txn.task_mut(id.as_str())?;
        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ModelError::EmptyTitle.into());
            }
            task.title = title.to_string();
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(start) = patch.start_date {
            task.start_date = start;
        }
        if let Some(due) = patch.due_date {
            task.due_date = due;
        }
        if let Some(assigned) = patch.assigned_to {
            task.assigned_to = assigned;
        }
        if let Some(by) = patch.requested_by {
            task.requested_by = by;
        }
        if let Some(at) = patch.requested_at {
            task.requested_at = at;
        }
        if let Some(note) = patch.requested_note {
            task.requested_note = note;
        }
        for tag in &patch.remove_tags {
            task.tags.remove(tag);
        }
        task.tags.extend(patch.add_tags);
        for (key, value) in patch.metadata {
            match value {
                Some(value) => {
                    task.metadata.insert(key, value);
                }
                None => {
                    task.metadata.remove(&key);
                }
            }
        }
    }

    for parent in &patch.remove_parents {
        let parent = txn.graph().require(parent.as_str())?.id.clone();
        txn.remove_edge(&parent, &id)?;
    }
    for child in &patch.remove_children {
        let child = txn.graph().require(child.as_str())?.id.clone();
        txn.remove_edge(&id, &child)?;
    }
    let added = link_all(&mut txn, &id, &patch.add_parents, &patch.add_children)?;
    if let Some(status) = patch.status {
        apply_status(&mut txn, &id, status)?;
    }
    ensure_acyclic(txn.graph(), &added)?;
    txn.commit();

    tracing::debug!(%id, links_added = added.len(), "updated task");
    Ok(())
}

/// Change one task's status. Archiving is untouched.
///
/// Reviving a removed task brings its edges back into the acyclic relation,
/// so that direction is cycle-checked.
///
/// # Errors
///
/// [`GraphError::UnknownId`], or [`GraphError::CycleDetected`] when reviving
/// the task would close a loop.
pub fn set_status(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    id: &str,
    status: Status,
) -> Result<(), GraphError> {
    let id = graph.require(id)?.id.clone();
    let mut txn = GraphTxn::begin(graph, ctx.now());
    apply_status(&mut txn, &id, status)?;
    txn.commit();
    Ok(())
}

fn apply_status(txn: &mut GraphTxn<'_>, id: &TaskId, status: Status) -> Result<bool, GraphError> {
    let current = txn.graph().require(id.as_str())?.status;
    if current == status {
        return Ok(false);
    }
    txn.task_mut(id.as_str())?.status = status;

    if current.is_removed() {
        if let Some(path) = cycles::cycle_through(txn.graph(), id) {
            let attempted_edge = match path.as_slice() {
                [from, to, ..] => Edge::new(from.clone(), to.clone()),
                _ => Edge::new(id.clone(), id.clone()),
            };
            return Err(GraphError::CycleDetected {
                attempted_edge,
                path,
            });
        }
    }
    tracing::debug!(%id, from = %current, to = %status, "status changed");
    Ok(true)
}

/// Delegation details for [`request`].
#[derive(Debug, Clone, Default)]
pub struct RequestDetails {
    /// Who the task is handed to.
    pub to: Option<String>,
    /// Who asked.
    pub by: String,
    pub note: Option<String>,
    /// Overrides the task's due date when set.
    pub due: Option<Timestamp>,
}

/// Hand a task to someone: `status = requested` plus delegation metadata.
///
/// `requested_at` is only set the first time a task is requested.
///
/// # Errors
///
/// [`GraphError::UnknownId`], or [`GraphError::CycleDetected`] when the task
/// was removed and reviving it would close a loop.
pub fn request(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    id: &str,
    details: RequestDetails,
) -> Result<(), GraphError> {
    let id = graph.require(id)?.id.clone();
    let now = ctx.now();
    let mut txn = GraphTxn::begin(graph, now);

    {
        let task = txn.task_mut(id.as_str())?;
        if let Some(to) = details.to {
            task.assigned_to = Some(to);
        }
        if let Some(note) = details.note {
            task.requested_note = Some(format!("{REQUEST_NOTE_PREFIX} {note}"));
        }
        if let Some(due) = details.due {
            task.due_date = Some(due);
        }
        task.requested_by = Some(details.by);
        if task.requested_at.is_none() {
            task.requested_at = Some(now);
        }
    }
    apply_status(&mut txn, &id, Status::Requested)?;
    txn.commit();
    Ok(())
}

/// Time since a task was requested, and time left until its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestAge {
    pub elapsed_secs: i64,
    /// Negative once the due date has passed.
    pub remaining_secs: Option<i64>,
}

/// Age of a request at `now`, or `None` for tasks never requested.
#[must_use]
pub fn request_age(task: &Task, now: Timestamp) -> Option<RequestAge> {
    let requested_at = task.requested_at?;
    Some(RequestAge {
        elapsed_secs: now.unix_seconds() - requested_at.unix_seconds(),
        remaining_secs: task
            .due_date
            .map(|due| due.unix_seconds() - now.unix_seconds()),
    })
}

fn days_hours(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();
    format!("{sign}{}d{}h", secs / 86_400, (secs % 86_400) / 3_600)
}

impl fmt::Display for RequestAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", days_hours(self.elapsed_secs))?;
        if let Some(remaining) = self.remaining_secs {
            write!(f, " / SLA:{}", days_hours(remaining))?;
        }
        Ok(())
    }
}

/// Soft removal: `status = removed`, edges kept.
///
/// # Errors
///
/// [`GraphError::UnknownId`] when `id` does not exist.
pub fn remove_task(graph: &mut TaskGraph, ctx: &OpsContext<'_>, id: &str) -> Result<(), GraphError> {
    set_status(graph, ctx, id, Status::Removed)
}

/// Hard delete: strip every edge that references the task, then drop it.
///
/// # Errors
///
/// [`GraphError::UnknownId`] when `id` does not exist.
pub fn delete_task(graph: &mut TaskGraph, ctx: &OpsContext<'_>, id: &str) -> Result<Task, GraphError> {
    let id = graph.require(id)?.id.clone();
    let mut txn = GraphTxn::begin(graph, ctx.now());
    txn.detach(&id)?;
    let task = txn.remove_task(id.as_str())?;
    txn.commit();
    tracing::debug!(%id, "deleted task");
    Ok(task)
}
