//! The in-memory task graph and the pure analyses over it.
//!
//! - [`TaskGraph`] owns every [`Task`] keyed by id. Edges live redundantly on
//!   both endpoints (`children` on the parent, `depends_on` on the child).
//! - [`cycles`] finds directed cycles, both incrementally and as a full scan.
//! - [`consistency`] reports drift between the two sides of an edge.
//! - [`components`] computes weakly-connected components.
//! - [`blocking`] answers readiness, bottleneck and ancestor questions.
//!
//! Nothing in this module mutates a graph except through the crate-private
//! accessors used by [`crate::ops`].

#![allow(clippy::module_name_repetitions)]

pub mod blocking;
pub mod components;
pub mod consistency;
pub mod cycles;

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::GraphError;
use crate::model::{Task, TaskId};

/// A full snapshot of every task, keyed and iterated by id.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loaded tasks.
    ///
    /// Edge drift and dangling references are accepted here so a damaged
    /// snapshot can still be inspected; [`consistency::validate`] reports them.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] when two tasks share an id.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for task in tasks {
            if graph.tasks.contains_key(&task.id) {
                return Err(GraphError::DuplicateId { id: task.id });
            }
            graph.tasks.insert(task.id.clone(), task);
        }
        Ok(graph)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Look up a task that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownId`] when `id` is not in the graph.
    pub fn require(&self, id: &str) -> Result<&Task, GraphError> {
        self.tasks.get(id).ok_or_else(|| GraphError::unknown(id))
    }

    /// Every task in id order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Task> + '_ {
        self.tasks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> + '_ {
        self.tasks.keys()
    }

    #[must_use]
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks.into_values().collect()
    }

    /// Resolve a full id or a unique id prefix.
    ///
    /// An exact match always wins, even when the same string is also a prefix
    /// of other ids.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownId`] when nothing matches and
    /// [`GraphError::AmbiguousId`] when several ids share the prefix.
    pub fn resolve_id(&self, raw: &str) -> Result<TaskId, GraphError> {
        let prefix = raw.trim();
        if let Some((id, _)) = self.tasks.get_key_value(prefix) {
            return Ok(id.clone());
        }
        if prefix.is_empty() {
            return Err(GraphError::unknown(raw));
        }

        let mut matches: Vec<TaskId> = self
            .tasks
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(id, _)| id)
            .take_while(|id| id.as_str().starts_with(prefix))
            .cloned()
            .collect();

        if matches.len() > 1 {
            return Err(GraphError::AmbiguousId {
                prefix: prefix.to_string(),
                matches,
            });
        }
        matches.pop().ok_or_else(|| GraphError::unknown(prefix))
    }

    /// Whether `from -> to` is recorded on both endpoints.
    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        let forward = self
            .get(from)
            .is_some_and(|t| t.children.iter().any(|c| c.as_str() == to));
        let backward = self
            .get(to)
            .is_some_and(|t| t.depends_on.iter().any(|p| p.as_str() == from));
        forward && backward
    }

    /// Whether `from -> to` is recorded on at least one endpoint.
    #[must_use]
    pub fn has_any_edge_side(&self, from: &str, to: &str) -> bool {
        self.get(from)
            .is_some_and(|t| t.children.iter().any(|c| c.as_str() == to))
            || self
                .get(to)
                .is_some_and(|t| t.depends_on.iter().any(|p| p.as_str() == from))
    }

    /// Field-by-field equality of every task.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        self.tasks.len() == other.tasks.len()
            && self
                .tasks
                .values()
                .zip(other.tasks.values())
                .all(|(a, b)| a.deep_eq(b))
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub(crate) fn require_mut(&mut self, id: &str) -> Result<&mut Task, GraphError> {
        self.tasks.get_mut(id).ok_or_else(|| GraphError::unknown(id))
    }

    pub(crate) fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.id.clone(), task)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.remove(id)
    }
}

impl PartialEq for TaskGraph {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl Eq for TaskGraph {}

impl<'a> IntoIterator for &'a TaskGraph {
    type Item = &'a Task;
    type IntoIter = std::collections::btree_map::Values<'a, TaskId, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.values()
    }
}
