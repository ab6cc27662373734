//! Readiness, bottlenecks and ancestor explanations.
//!
//! # Scheduling Semantics
//!
//! Nothing here is enforced. A task may be started or finished regardless of
//! its parents; these queries only explain why doing so might be premature.
//!
//! - A task is **ready** when it has no parents or every parent is done. A
//!   removed or missing parent is not done, so it still blocks.
//! - A task is a **bottleneck** when at least one child is not done,
//!   including removed and missing children.
//! - [`blocked_by`] lists every transitive parent with its completion state.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use super::TaskGraph;
use crate::error::GraphError;
use crate::model::{Status, Task, TaskId};

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Whether all of `task`'s parents are done.
pub fn is_ready(graph: &TaskGraph, task: &Task) -> bool {
    task.depends_on
        .iter()
        .all(|parent| graph.get(parent.as_str()).is_some_and(|p| p.status.is_done()))
}

/// Whether any child of `task` is still unfinished.
pub fn is_bottleneck(graph: &TaskGraph, task: &Task) -> bool {
    task.children
        .iter()
        .any(|child| graph.get(child.as_str()).is_none_or(|c| !c.status.is_done()))
}

/// Unarchived, unfinished tasks whose parents are all done, in id order.
pub fn ready_tasks(graph: &TaskGraph) -> Vec<&Task> {
    graph
        .iter()
        .filter(|t| !t.is_archived && !t.status.is_done() && !t.status.is_removed())
        .filter(|t| is_ready(graph, t))
        .collect()
}

// ---------------------------------------------------------------------------
// Ancestors
// ---------------------------------------------------------------------------

/// One transitive parent of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    pub id: TaskId,
    pub title: String,
    pub status: Status,
    pub done: bool,
    /// 1 for direct parents, 2 for grandparents, and so on.
    pub depth: usize,
}

/// Every ancestor of `id`, nearest first, each listed once.
///
/// Direction is respected: only `depends_on` links are followed. Dangling
/// parent ids are skipped; see [`dependency_info`] to surface them.
///
/// # Errors
///
/// Returns [`GraphError::UnknownId`] when `id` is not in the graph.
pub fn blocked_by(graph: &TaskGraph, id: &str) -> Result<Vec<Blocker>, GraphError> {
    let start = graph.require(id)?;

    let mut seen: HashSet<&TaskId> = HashSet::new();
    seen.insert(&start.id);
    let mut queue: VecDeque<(&Task, usize)> = VecDeque::new();
    queue.push_back((start, 0));
    let mut out = Vec::new();

    while let Some((task, depth)) = queue.pop_front() {
        for parent_id in &task.depends_on {
            let Some(parent) = graph.get(parent_id.as_str()) else {
                continue;
            };
            if !seen.insert(&parent.id) {
                continue;
            }
            out.push(Blocker {
                id: parent.id.clone(),
                title: parent.title.clone(),
                status: parent.status,
                done: parent.status.is_done(),
                depth: depth + 1,
            });
            queue.push_back((parent, depth + 1));
        }
    }

    Ok(out)
}

/// Unfinished ancestors only.
///
/// # Errors
///
/// Returns [`GraphError::UnknownId`] when `id` is not in the graph.
pub fn open_blockers(graph: &TaskGraph, id: &str) -> Result<Vec<Blocker>, GraphError> {
    Ok(blocked_by(graph, id)?
        .into_iter()
        .filter(|b| !b.done && !b.status.is_removed())
        .collect())
}

// ---------------------------------------------------------------------------
// Direct links
// ---------------------------------------------------------------------------

/// A direct parent or child as seen from one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedTask {
    pub id: TaskId,
    /// `None` when the id does not resolve to a task.
    pub title: Option<String>,
    pub status: Option<Status>,
}

impl LinkedTask {
    fn resolve(graph: &TaskGraph, id: &TaskId) -> Self {
        let task = graph.get(id.as_str());
        Self {
            id: id.clone(),
            title: task.map(|t| t.title.clone()),
            status: task.map(|t| t.status),
        }
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.title.is_none()
    }
}

/// The direct neighborhood of a task, in stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub id: TaskId,
    pub title: String,
    pub status: Status,
    pub parents: Vec<LinkedTask>,
    pub children: Vec<LinkedTask>,
}

/// Direct parents and children of `id`, with dangling ids marked missing.
///
/// # Errors
///
/// Returns [`GraphError::UnknownId`] when `id` is not in the graph.
pub fn dependency_info(graph: &TaskGraph, id: &str) -> Result<DependencyInfo, GraphError> {
    let task = graph.require(id)?;
    Ok(DependencyInfo {
        id: task.id.clone(),
        title: task.title.clone(),
        status: task.status,
        parents: task
            .depends_on
            .iter()
            .map(|p| LinkedTask::resolve(graph, p))
            .collect(),
        children: task
            .children
            .iter()
            .map(|c| LinkedTask::resolve(graph, c))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, id};

    #[test]
    fn root_task_is_ready() {
        let g = graph(&["a", "b"], &[("a", "b")]);
        assert!(is_ready(&g, g.get("a").unwrap()));
        assert!(!is_ready(&g, g.get("b").unwrap()));
    }

    #[test]
    fn only_done_parents_unblock() {
        let mut g = graph(&["a", "b", "c"], &[("a", "c"), ("b", "c")]);
        g.get_mut("a").unwrap().status = Status::Done;
        assert!(!is_ready(&g, g.get("c").unwrap()));
        g.get_mut("b").unwrap().status = Status::Removed;
        assert!(!is_ready(&g, g.get("c").unwrap()));
        g.get_mut("b").unwrap().status = Status::Done;
        assert!(is_ready(&g, g.get("c").unwrap()));
    }

    #[test]
    fn missing_parent_blocks() {
        let mut g = graph(&["a"], &[]);
        g.get_mut("a").unwrap().depends_on.push(id("ghost"));
        assert!(!is_ready(&g, g.get("a").unwrap()));
    }

    #[test]
    fn bottleneck_needs_an_open_child() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        assert!(is_bottleneck(&g, g.get("a").unwrap()));
        assert!(!is_bottleneck(&g, g.get("b").unwrap()));
        g.get_mut("b").unwrap().status = Status::Done;
        assert!(!is_bottleneck(&g, g.get("a").unwrap()));
        g.get_mut("b").unwrap().status = Status::Removed;
        assert!(is_bottleneck(&g, g.get("a").unwrap()));
    }

    #[test]
    fn ready_tasks_skip_archived_and_finished() {
        let mut g = graph(&["a", "b", "c", "d"], &[("a", "b")]);
        g.get_mut("c").unwrap().is_archived = true;
        g.get_mut("d").unwrap().status = Status::Done;
        let ready: Vec<&str> = ready_tasks(&g).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["a"]);
    }

    #[test]
    fn blocked_by_walks_ancestors_breadth_first() {
        let mut g = graph(
            &["root", "mid1", "mid2", "leaf", "other"],
            &[
                ("root", "mid1"),
                ("root", "mid2"),
                ("mid1", "leaf"),
                ("mid2", "leaf"),
                ("leaf", "other"),
            ],
        );
        g.get_mut("mid1").unwrap().status = Status::Done;

        let blockers = blocked_by(&g, "leaf").unwrap();
        let seen: Vec<(&str, usize, bool)> = blockers
            .iter()
            .map(|b| (b.id.as_str(), b.depth, b.done))
            .collect();
        assert_eq!(
            seen,
            vec![("mid1", 1, true), ("mid2", 1, false), ("root", 2, false)]
        );

        let open: Vec<TaskId> = open_blockers(&g, "leaf")
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(open, vec![id("mid2"), id("root")]);
    }

    #[test]
    fn blocked_by_unknown_id_fails() {
        let g = graph(&["a"], &[]);
        assert!(matches!(
            blocked_by(&g, "zzz"),
            Err(GraphError::UnknownId { .. })
        ));
    }

    #[test]
    fn dependency_info_marks_missing_links() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.get_mut("b").unwrap().depends_on.push(id("ghost"));

        let info = dependency_info(&g, "b").unwrap();
        assert_eq!(info.parents.len(), 2);
        assert_eq!(info.parents[0].title.as_deref(), Some("task a"));
        assert!(info.parents[1].is_missing());
        assert!(info.children.is_empty());
    }
}
