use super::txn::GraphTxn;
use super::OpsContext;
use crate::error::GraphError;
use crate::graph::{components, TaskGraph};
use crate::model::TaskId;

/// Set `is_archived` on every task in the seed's weakly-connected component.
///
/// Only tasks whose flag actually changes are touched, so repeating the call
/// changes nothing. Returns the ids that changed, in id order.
///
/// # Errors
///
/// [`GraphError::UnknownId`] when `seed` does not exist.
pub fn archive_tree(
    graph: &mut TaskGraph,
    ctx: &OpsContext<'_>,
    seed: &str,
    archived: bool,
) -> Result<Vec<TaskId>, GraphError> {
    let members = components::component_of(graph, seed)?;
    let changed: Vec<TaskId> = members
        .into_iter()
        .filter(|id| graph.get(id.as_str()).is_some_and(|t| t.is_archived != archived))
        .collect();

    let mut txn = GraphTxn::begin(graph, ctx.now());
    for id in &changed {
        txn.task_mut(id.as_str())?.is_archived = archived;
    }
    txn.commit();

    tracing::debug!(seed, archived, changed = changed.len(), "archive flag applied to tree");
    Ok(changed)
}
