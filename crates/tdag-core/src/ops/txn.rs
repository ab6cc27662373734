//! Undo journal for multi-step graph mutations.
//!
//! Every task is journaled (its full pre-image, or "absent") the first time a
//! transaction touches it. Dropping an uncommitted transaction restores the
//! pre-images in reverse order, so a failed operation leaves the graph
//! field-for-field identical to its state before the call.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::graph::TaskGraph;
use crate::model::{Task, TaskId, Timestamp};

pub struct GraphTxn<'g> {
    graph: &'g mut TaskGraph,
    journal: Vec<(TaskId, Option<Task>)>,
    touched: HashSet<TaskId>,
    now: Timestamp,
    committed: bool,
}

impl<'g> GraphTxn<'g> {
    pub fn begin(graph: &'g mut TaskGraph, now: Timestamp) -> Self {
        Self {
            graph,
            journal: Vec::new(),
            touched: HashSet::new(),
            now,
            committed: false,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        self.graph
    }

    pub const fn now(&self) -> Timestamp {
        self.now
    }

    fn remember(&mut self, id: &TaskId) {
        if self.touched.insert(id.clone()) {
            let pre = self.graph.get(id.as_str()).cloned();
            self.journal.push((id.clone(), pre));
        }
    }

    /// Mutable access to an existing task. Its pre-image is journaled and its
    /// `updated_at` is bumped to the transaction's instant.
    pub fn task_mut(&mut self, id: &str) -> Result<&mut Task, GraphError> {
        let id = self.graph.require(id)?.id.clone();
        self.remember(&id);
        let now = self.now;
        let task = self.graph.require_mut(id.as_str())?;
        task.updated_at = now;
        Ok(task)
    }

    pub fn insert_task(&mut self, task: Task) -> Result<(), GraphError> {
        if self.graph.contains(task.id.as_str()) {
            return Err(GraphError::DuplicateId { id: task.id });
        }
        self.remember(&task.id);
        self.graph.insert(task);
        Ok(())
    }

    pub fn remove_task(&mut self, id: &str) -> Result<Task, GraphError> {
        let id = self.graph.require(id)?.id.clone();
        self.remember(&id);
        self.graph
            .remove(id.as_str())
            .ok_or_else(|| GraphError::unknown(&id))
    }

    /// Record `from -> to` on both endpoints. Sides that already hold the
    /// edge are left as they are, so a half-recorded edge is repaired.
    ///
    /// Returns whether anything changed. No cycle check happens here.
    pub fn add_edge(&mut self, from: &TaskId, to: &TaskId) -> Result<bool, GraphError> {
        self.graph.require(from.as_str())?;
        self.graph.require(to.as_str())?;
        if self.graph.has_edge(from.as_str(), to.as_str()) {
            return Ok(false);
        }

        let parent = self.task_mut(from.as_str())?;
        if !parent.children.contains(to) {
            parent.children.push(to.clone());
        }
        let child = self.task_mut(to.as_str())?;
        if !child.depends_on.contains(from) {
            child.depends_on.push(from.clone());
        }
        Ok(true)
    }

    /// Remove `from -> to` from both endpoints.
    ///
    /// The edge must be present on both sides; otherwise nothing changes and
    /// a single [`GraphError::EdgeNotFound`] is returned.
    pub fn remove_edge(&mut self, from: &TaskId, to: &TaskId) -> Result<(), GraphError> {
        if !self.graph.has_edge(from.as_str(), to.as_str()) {
            return Err(GraphError::EdgeNotFound {
                from: from.clone(),
                to: to.clone(),
            });
        }
        self.task_mut(from.as_str())?.children.retain(|c| c != to);
        self.task_mut(to.as_str())?.depends_on.retain(|p| p != from);
        Ok(())
    }

    /// Strip every reference to `id` from the tasks on the other end of its
    /// edges, including one-sided and dangling ones.
    pub fn detach(&mut self, id: &TaskId) -> Result<(), GraphError> {
        let neighbors: Vec<TaskId> = self
            .graph
            .iter()
            .filter(|t| &t.id != id && (t.depends_on.contains(id) || t.children.contains(id)))
            .map(|t| t.id.clone())
            .collect();
        for neighbor in neighbors {
            let task = self.task_mut(neighbor.as_str())?;
            task.depends_on.retain(|p| p != id);
            task.children.retain(|c| c != id);
        }
        let task = self.task_mut(id.as_str())?;
        task.depends_on.clear();
        task.children.clear();
        Ok(())
    }

    /// Number of tasks touched so far.
    pub fn touched(&self) -> usize {
        self.touched.len()
    }

    pub fn commit(mut self) {
        self.committed = true;
        self.journal.clear();
    }

    fn rollback(&mut self) {
        let steps = self.journal.len();
        for (id, pre) in self.journal.drain(..).rev() {
            match pre {
                Some(task) => {
                    self.graph.insert(task);
                }
                None => {
                    self.graph.remove(id.as_str());
                }
            }
        }
        if steps > 0 {
            tracing::debug!(steps, "rolled back graph transaction");
        }
    }
}

impl Drop for GraphTxn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
