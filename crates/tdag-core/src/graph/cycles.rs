//! Cycle detection for the task dependency graph.
//!
//! # Overview
//!
//! Edges point from a parent to the child that depends on it. The relation
//! restricted to tasks whose status is not `removed` must stay acyclic.
//!
//! # Design
//!
//! - **Incremental check** ([`would_create_cycle`]): before an edge
//!   `from -> to` is committed, walk forward from `to` looking for `from`.
//!   Only sound when the rest of the graph is already acyclic, which holds for
//!   every graph produced by [`crate::ops`].
//! - **Full scan** ([`find_cycles`], [`has_cycles`]): three-color depth-first
//!   traversal over every live task. This is the authority for `check`, and
//!   it also follows edges recorded on only one endpoint.
//! - Both traversals use an explicit stack, so deep chains cannot overflow the
//!   call stack. Each visits every node and edge at most once.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use super::TaskGraph;
use crate::model::TaskId;

/// DFS visit state for each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not yet visited.
    White,
    /// Currently on the DFS stack.
    Gray,
    /// Fully explored.
    Black,
}

fn is_live(graph: &TaskGraph, id: &str) -> bool {
    graph.get(id).is_some_and(|t| !t.status.is_removed())
}

// ---------------------------------------------------------------------------
// Incremental check
// ---------------------------------------------------------------------------

/// Return the loop that adding `from -> to` would close, if any.
///
/// The path starts at `from`, follows the new edge to `to`, continues along
/// existing edges and ends at `from` again. A self-loop yields `[from, from]`.
/// Edges touching removed tasks never close a loop.
pub fn would_create_cycle(graph: &TaskGraph, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
    if from == to {
        return Some(vec![from.clone(), from.clone()]);
    }
    if !is_live(graph, from.as_str()) || !is_live(graph, to.as_str()) {
        return None;
    }

    let mut parent_of: HashMap<&TaskId, &TaskId> = HashMap::new();
    let mut visited: HashSet<&TaskId> = HashSet::new();
    let mut stack: Vec<&TaskId> = vec![to];
    visited.insert(to);

    while let Some(current) = stack.pop() {
        let Some(task) = graph.get(current.as_str()) else {
            continue;
        };
        for child in &task.children {
            if !is_live(graph, child.as_str()) || !visited.insert(child) {
                continue;
            }
            parent_of.insert(child, current);
            if child == from {
                return Some(reconstruct(from, to, &parent_of));
            }
            stack.push(child);
        }
    }

    None
}

/// Rebuild `from -> to -> ... -> from` from the forward walk's parent map.
fn reconstruct(from: &TaskId, to: &TaskId, parent_of: &HashMap<&TaskId, &TaskId>) -> Vec<TaskId> {
    let mut tail = vec![from.clone()];
    let mut cursor = from;
    while cursor != to {
        match parent_of.get(cursor) {
            Some(prev) => {
                tail.push((*prev).clone());
                cursor = prev;
            }
            None => break,
        }
    }
    tail.reverse();

    let mut path = Vec::with_capacity(tail.len() + 1);
    path.push(from.clone());
    path.extend(tail);
    path
}

/// Return a loop through `id` using existing edges, if one exists.
///
/// Used when a removed task comes back to life and its dormant edges rejoin
/// the live relation.
pub fn cycle_through(graph: &TaskGraph, id: &TaskId) -> Option<Vec<TaskId>> {
    let task = graph.get(id.as_str())?;
    if task.depends_on.iter().any(|p| p == id) || task.children.iter().any(|c| c == id) {
        return Some(vec![id.clone(), id.clone()]);
    }
    task.children
        .iter()
        .filter(|child| is_live(graph, child.as_str()))
        .find_map(|child| would_create_cycle(graph, id, child))
}

// ---------------------------------------------------------------------------
// Full scan
// ---------------------------------------------------------------------------

/// Successors of every live task: stored `children` plus any task that lists
/// it in `depends_on`, de-duplicated and in a stable order.
fn successors(graph: &TaskGraph) -> HashMap<&TaskId, Vec<&TaskId>> {
    let mut out: HashMap<&TaskId, Vec<&TaskId>> = HashMap::new();
    for task in graph.iter().filter(|t| !t.status.is_removed()) {
        let entry = out.entry(&task.id).or_default();
        for child in &task.children {
            if is_live(graph, child.as_str()) && !entry.contains(&child) {
                entry.push(child);
            }
        }
    }
    for task in graph.iter().filter(|t| !t.status.is_removed()) {
        for parent in &task.depends_on {
            if !is_live(graph, parent.as_str()) {
                continue;
            }
            let entry = out.entry(parent).or_default();
            if !entry.contains(&&task.id) {
                entry.push(&task.id);
            }
        }
    }
    out
}

/// Find directed cycles among live tasks.
///
/// One cycle is reported per back edge met by the traversal, so the result
/// is non-empty exactly when the graph has a cycle, though it need not list
/// every elementary cycle. Each path is closed: its first and last ids match.
pub fn find_cycles(graph: &TaskGraph) -> Vec<Vec<TaskId>> {
    let succ = successors(graph);
    let mut color: HashMap<&TaskId, Color> = graph
        .iter()
        .filter(|t| !t.status.is_removed())
        .map(|t| (&t.id, Color::White))
        .collect();
    let mut cycles = Vec::new();

    for root in graph.ids() {
        if color.get(root) != Some(&Color::White) {
            continue;
        }

        // Each frame holds a node and the index of its next successor.
        let mut stack: Vec<(&TaskId, usize)> = vec![(root, 0)];
        color.insert(root, Color::Gray);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let children = succ.get(node).map_or(&[][..], Vec::as_slice);

            if next >= children.len() {
                color.insert(node, Color::Black);
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let child = children[next];
            match color.get(child).copied() {
                Some(Color::White) => {
                    color.insert(child, Color::Gray);
                    stack.push((child, 0));
                }
                Some(Color::Gray) => {
                    let start = stack
                        .iter()
                        .position(|(id, _)| *id == child)
                        .unwrap_or(0);
                    let mut path: Vec<TaskId> =
                        stack[start..].iter().map(|(id, _)| (*id).clone()).collect();
                    path.push(child.clone());
                    cycles.push(path);
                }
                Some(Color::Black) | None => {}
            }
        }
    }

    cycles
}

/// Whether any directed cycle exists among live tasks.
pub fn has_cycles(graph: &TaskGraph) -> bool {
    !find_cycles(graph).is_empty()
}
