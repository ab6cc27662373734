//! Graph operations.
//!
//! Every operation takes the loaded snapshot by `&mut` and either applies its
//! whole effect or fails with a [`GraphError`] leaving the snapshot exactly
//! as it was. None of them perform I/O; callers persist the result through a
//! [`Store`](crate::store::Store).
//!
//! Multi-step mutations run inside a journaled transaction so the two sides
//! of every edge are always written together.

mod archive;
mod edges;
mod list;
mod tasks;
mod txn;

pub use archive::archive_tree;
pub use edges::{insert_between, link, unlink};
pub use list::{list_tasks, ArchivedFilter, ListFilter, ListOrder, Listing};
pub use tasks::{
    add_task, delete_task, remove_task, request, request_age, set_status, update_task,
    RequestAge, RequestDetails, TaskPatch, REQUEST_NOTE_PREFIX,
};

pub use crate::graph::blocking::{blocked_by, dependency_info, Blocker, DependencyInfo, LinkedTask};
pub use crate::graph::consistency::CheckReport;

use crate::clock::{Clock, IdGenerator};
use crate::error::GraphError;
use crate::graph::{consistency, cycles, TaskGraph};
use crate::model::{Edge, TaskId, Timestamp};

/// How many generated ids are tried before giving up on collisions.
const MAX_ID_ATTEMPTS: u32 = 16;

/// Environment injected into every mutating operation.
#[derive(Clone, Copy)]
pub struct OpsContext<'a> {
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdGenerator,
}

impl<'a> OpsContext<'a> {
    #[must_use]
    pub const fn new(clock: &'a dyn Clock, ids: &'a dyn IdGenerator) -> Self {
        Self { clock, ids }
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl std::fmt::Debug for OpsContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsContext").finish_non_exhaustive()
    }
}

/// Authoritative full scan: consistency findings plus every cycle.
#[must_use]
pub fn check(graph: &TaskGraph) -> CheckReport {
    consistency::validate(graph)
}

/// Fail with [`GraphError::InconsistentGraph`] unless [`check`] is clean.
///
/// # Errors
///
/// Returns every finding, cycles included, as one error.
pub fn ensure_valid(graph: &TaskGraph) -> Result<(), GraphError> {
    let report = check(graph);
    if report.is_clean() {
        return Ok(());
    }
    Err(GraphError::InconsistentGraph {
        violations: report.into_violations(),
    })
}

/// Resolve a full id or unique prefix.
///
/// # Errors
///
/// See [`TaskGraph::resolve_id`].
pub fn resolve_id(graph: &TaskGraph, raw: &str) -> Result<TaskId, GraphError> {
    graph.resolve_id(raw)
}

/// Pick the id for a new task: the requested one, or a generated one that
/// does not collide with the graph.
fn fresh_id(
    graph: &TaskGraph,
    ctx: &OpsContext<'_>,
    now: Timestamp,
    requested: Option<TaskId>,
) -> Result<TaskId, GraphError> {
    if let Some(id) = requested {
        if graph.contains(id.as_str()) {
            return Err(GraphError::DuplicateId { id });
        }
        return Ok(id);
    }

    let mut candidate = ctx.ids.next_id(now, 0);
    for attempt in 1..=MAX_ID_ATTEMPTS {
        if !graph.contains(candidate.as_str()) {
            return Ok(candidate);
        }
        tracing::debug!(id = %candidate, attempt, "generated id collided, retrying");
        candidate = ctx.ids.next_id(now, attempt);
    }
    Err(GraphError::DuplicateId { id: candidate })
}

fn cycle_error(attempted_edge: Edge, path: Vec<TaskId>) -> GraphError {
    GraphError::CycleDetected {
        attempted_edge,
        path,
    }
}

/// Fail if any of `edges` closes a loop in `graph`.
///
/// Each new edge is tested with the incremental check. Any loop in a graph
/// that was acyclic before the edges were added must pass through one of
/// them, so probing each one is enough.
fn ensure_acyclic(graph: &TaskGraph, edges: &[Edge]) -> Result<(), GraphError> {
    for edge in edges {
        if let Some(path) = cycles::would_create_cycle(graph, &edge.from, &edge.to) {
            return Err(cycle_error(edge.clone(), path));
        }
    }
    Ok(())
}
