//! Edge operations: link, unlink, insert-between.

use super::tasks::link_all;
use super::txn::GraphTxn;
use super::{cycle_error, ensure_acyclic, fresh_id, OpsContext};
use crate::error::GraphError;
use crate::graph::{cycles, TaskGraph};
use crate::model::{Edge, TaskDraft, TaskId};

/// Make `child` depend on `parent`.
///
/// Linking an edge that already exists on both sides is a no-op. An edge
/// recorded on only one side is completed.
///
/// # Errors
///
/// - [`GraphError::UnknownId`] when either end does not exist.
/// - [`GraphError::CycleDetected`] when the edge would close a loop,
///   including `parent == child`.
pub fn link(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    parent: &str,
    child: &str,
) -> Result<Edge, GraphError> {
    let from = graph.require(parent)?.id.clone();
    let to = graph.require(child)?.id.clone();
    let edge = Edge::new(from, to);

    if graph.has_edge(edge.from.as_str(), edge.to.as_str()) {
        return Ok(edge);
    }
    if let Some(path) = cycles::would_create_cycle(graph, &edge.from, &edge.to) {
        tracing::debug!(%edge, "link rejected, would close a loop");
        return Err(cycle_error(edge, path));
    }

    let mut txn = GraphTxn::begin(graph, ctx.now());
    txn.add_edge(&edge.from, &edge.to)?;
    txn.commit();
    tracing::debug!(%edge, "linked");
    Ok(edge)
}

/// Remove the edge `parent -> child` from both endpoints.
///
/// # Errors
///
/// [`GraphError::UnknownId`] when either end does not exist, and
/// [`GraphError::EdgeNotFound`] unless both sides record the edge.
pub fn unlink(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    parent: &str,
    child: &str,
) -> Result<Edge, GraphError> {
    let from = graph.require(parent)?.id.clone();
    let to = graph.require(child)?.id.clone();

    let mut txn = GraphTxn::begin(graph, ctx.now());
    txn.remove_edge(&from, &to)?;
    txn.commit();

    let edge = Edge::new(from, to);
    tracing::debug!(%edge, "unlinked");
    Ok(edge)
}

/// Split the edge `a -> b` with a new task: `a -> new -> b`.
///
/// The draft's own parents and children are linked too, in the same
/// transaction.
///
/// # Errors
///
/// - [`GraphError::UnknownId`] when `a`, `b` or a draft link does not exist.
/// - [`GraphError::EdgeNotFound`] unless `a -> b` exists on both sides.
/// - [`GraphError::CycleDetected`] when the draft's extra links close a loop.
/// - [`GraphError::InvalidTask`] and [`GraphError::DuplicateId`] as for
///   [`super::add_task`].
pub fn insert_between(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    a: &str,
    b: &str,
    draft: TaskDraft,
) -> Result<TaskId, GraphError> {
    let a = graph.require(a)?.id.clone();
    let b = graph.require(b)?.id.clone();
    if !graph.has_edge(a.as_str(), b.as_str()) {
        return Err(GraphError::EdgeNotFound { from: a, to: b });
    }

    let now = ctx.now();
    let id = fresh_id(graph, ctx, now, draft.id.clone())?;
    let (task, mut parents, mut children) = draft.into_task(id.clone(), now)?;
    if !parents.contains(&a) {
        parents.insert(0, a.clone());
    }
    if !children.contains(&b) {
        children.insert(0, b.clone());
    }

    let mut txn = GraphTxn::begin(graph, now);
    txn.insert_task(task)?;
    txn.remove_edge(&a, &b)?;
    let added = link_all(&mut txn, &id, &parents, &children)?;
    ensure_acyclic(txn.graph(), &added)?;
    txn.commit();

    tracing::debug!(%id, from = %a, to = %b, "inserted task between");
    Ok(id)
}
