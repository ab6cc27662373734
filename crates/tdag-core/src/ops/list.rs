//! Filtered, ordered task listing.
//!
//! [`list_tasks`] validates the filter eagerly (an unknown component seed
//! fails up front) but defers filtering and sorting until the listing is
//! first iterated. The computed order is cached, so every later iteration
//! replays exactly the same sequence.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use crate::error::GraphError;
use crate::graph::{blocking, components, TaskGraph};
use crate::model::{Status, Task, TaskId, Timestamp};
use crate::order;

/// Which side of the archive flag to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchivedFilter {
    /// Non-archived tasks only.
    #[default]
    Active,
    ArchivedOnly,
    All,
}

impl ArchivedFilter {
    const fn admits(self, archived: bool) -> bool {
        match self {
            Self::Active => !archived,
            Self::ArchivedOnly => archived,
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    Default,
    Topological,
}

/// Any combination of listing filters. The default lists every active,
/// non-removed task in default order.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to these statuses. Empty means "any".
    pub status: Vec<Status>,
    pub archived: ArchivedFilter,
    /// Case-insensitive substring match over title and description.
    pub query: Option<String>,
    pub ready_only: bool,
    pub bottleneck_only: bool,
    /// Restrict to the weakly-connected component of this id.
    pub component_of: Option<TaskId>,
    pub requested_only: bool,
    pub tag: Option<String>,
    /// Show removed tasks even when `status` does not ask for them.
    pub include_removed: bool,
    pub order: ListOrder,
}

impl ListFilter {
    fn admits(&self, graph: &TaskGraph, task: &Task, query: Option<&str>) -> bool {
        if self.status.is_empty() {
            if task.status.is_removed() && !self.include_removed {
                return false;
            }
        } else if !self.status.contains(&task.status) {
            return false;
        }
        if !self.archived.admits(task.is_archived) {
            return false;
        }
        if self.requested_only && task.status != Status::Requested {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !task.tags.contains(tag) {
                return false;
            }
        }
        if let Some(needle) = query {
            let title = task.title.to_lowercase();
            let description = task.description_or_empty().to_lowercase();
            if !title.contains(needle) && !description.contains(needle) {
                return false;
            }
        }
        if self.ready_only && !blocking::is_ready(graph, task) {
            return false;
        }
        if self.bottleneck_only && !blocking::is_bottleneck(graph, task) {
            return false;
        }
        true
    }
}

/// Lazy result of [`list_tasks`]. Iterate it as many times as needed.
#[derive(Debug)]
pub struct Listing<'g> {
    graph: &'g TaskGraph,
    filter: ListFilter,
    component: Option<BTreeSet<TaskId>>,
    now: Timestamp,
    cache: OnceCell<Vec<&'g Task>>,
}

impl<'g> Listing<'g> {
    fn tasks(&self) -> &[&'g Task] {
        self.cache.get_or_init(|| self.compute())
    }

    fn compute(&self) -> Vec<&'g Task> {
        let query = self
            .filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut selected: Vec<&'g Task> = self
            .graph
            .iter()
            .filter(|t| self.component.as_ref().is_none_or(|c| c.contains(&t.id)))
            .filter(|t| self.filter.admits(self.graph, t, query.as_deref()))
            .collect();

        match self.filter.order {
            ListOrder::Default => {
                order::sort_default(&mut selected, self.now);
                selected
            }
            ListOrder::Topological => order::topological_order(&selected, self.now),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'g Task> + '_ {
        self.tasks().iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    /// The instant that stands in for a missing start date.
    #[must_use]
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<&'g Task> {
        self.tasks().to_vec()
    }
}

impl<'a, 'g> IntoIterator for &'a Listing<'g> {
    type Item = &'g Task;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, &'g Task>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks().iter().copied()
    }
}

/// Filter and order the tasks of a snapshot.
///
/// `now` is sampled once by the caller and used for every comparison in this
/// listing.
///
/// # Errors
///
/// [`GraphError::UnknownId`] when `component_of` names a task that does not
/// exist.
pub fn list_tasks(
    graph: &TaskGraph,
    filter: ListFilter,
    now: Timestamp,
) -> Result<Listing<'_>, GraphError> {
    let component = match &filter.component_of {
        Some(seed) => Some(components::component_of(graph, seed.as_str())?),
        None => None,
    };
    Ok(Listing {
        graph,
        filter,
        component,
        now,
        cache: OnceCell::new(),
    })
}
