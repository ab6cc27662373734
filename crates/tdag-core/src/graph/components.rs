//! Weakly-connected components.
//!
//! Edge direction is ignored here: a task is connected to its parents and its
//! children alike. Components are the unit of archive and restore.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::TaskGraph;
use crate::error::GraphError;
use crate::model::TaskId;

type Adjacency<'g> = HashMap<&'g TaskId, Vec<&'g TaskId>>;

/// Undirected adjacency built from both edge lists, so an edge recorded on
/// only one endpoint still connects its two tasks. Unknown ids are dropped.
fn undirected(graph: &TaskGraph) -> Adjacency<'_> {
    let mut adj: Adjacency<'_> = HashMap::new();
    for task in graph.iter() {
        for other in task.depends_on.iter().chain(task.children.iter()) {
            let Some(other) = graph.get(other.as_str()) else {
                continue;
            };
            adj.entry(&task.id).or_default().push(&other.id);
            adj.entry(&other.id).or_default().push(&task.id);
        }
    }
    adj
}

fn walk(adj: &Adjacency<'_>, seed: &TaskId) -> BTreeSet<TaskId> {
    let mut seen: HashSet<&TaskId> = HashSet::new();
    let mut stack = vec![seed];
    seen.insert(seed);

    while let Some(current) = stack.pop() {
        for &next in adj.get(current).into_iter().flatten() {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }

    seen.into_iter().cloned().collect()
}

/// The weakly-connected component containing `seed`, including `seed`.
///
/// References to ids that are not in the graph are skipped.
///
/// # Errors
///
/// Returns [`GraphError::UnknownId`] when `seed` is not in the graph.
pub fn component_of(graph: &TaskGraph, seed: &str) -> Result<BTreeSet<TaskId>, GraphError> {
    let start = graph.require(seed)?;
    Ok(walk(&undirected(graph), &start.id))
}

/// Every weakly-connected component, ordered by smallest member id.
#[must_use]
pub fn components(graph: &TaskGraph) -> Vec<BTreeSet<TaskId>> {
    let adj = undirected(graph);
    let mut assigned: HashSet<&TaskId> = HashSet::new();
    let mut out = Vec::new();

    for id in graph.ids() {
        if assigned.contains(id) {
            continue;
        }
        let component = walk(&adj, id);
        for member in &component {
            if let Some(task) = graph.get(member.as_str()) {
                assigned.insert(&task.id);
            }
        }
        out.push(component);
    }

    out
}

/// Whether `a` and `b` belong to the same component.
///
/// # Errors
///
/// Returns [`GraphError::UnknownId`] when either id is not in the graph.
pub fn same_component(graph: &TaskGraph, a: &str, b: &str) -> Result<bool, GraphError> {
    graph.require(b)?;
    Ok(component_of(graph, a)?.contains(b))
}
