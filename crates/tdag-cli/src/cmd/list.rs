//! `td list`: filtered, ordered task listing.

use clap::{Args, ValueEnum};
use tdag_core::ops::{self, ArchivedFilter, ListFilter, ListOrder};
use tdag_core::Status;

use super::Session;
use crate::output::{render_list, TaskView};
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ArchivedArg {
    /// Only tasks that are not archived.
    #[default]
    Active,
    /// Only archived tasks.
    Only,
    /// Both.
    All,
}

impl From<ArchivedArg> for ArchivedFilter {
    fn from(arg: ArchivedArg) -> Self {
        match arg {
            ArchivedArg::Active => Self::Active,
            ArchivedArg::Only => Self::ArchivedOnly,
            ArchivedArg::All => Self::All,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only these statuses (comma-separated or repeated).
    #[arg(short, long, value_parser = validate::parse_status, value_delimiter = ',')]
    pub status: Vec<Status>,

    /// Archived filter.
    #[arg(long, value_enum, default_value_t = ArchivedArg::Active)]
    pub archived: ArchivedArg,

    /// Case-insensitive text search over title and description.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Only tasks whose parents are all done.
    #[arg(long)]
    pub ready: bool,

    /// Only tasks with at least one unfinished child.
    #[arg(long)]
    pub bottleneck: bool,

    /// Only the connected component containing this task.
    #[arg(long, value_name = "ID")]
    pub component: Option<String>,

    /// Only requested tasks.
    #[arg(long)]
    pub requested: bool,

    /// Only tasks carrying this tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Show removed tasks too.
    #[arg(long)]
    pub include_removed: bool,

    /// Dependency order instead of priority order.
    #[arg(long)]
    pub topo: bool,

    /// Print at most this many tasks.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl ListArgs {
    fn filter(&self) -> ListFilter {
        ListFilter {
            status: self.status.clone(),
            archived: self.archived.into(),
            query: self.query.clone(),
            ready_only: self.ready,
            bottleneck_only: self.bottleneck,
            component_of: None,
            requested_only: self.requested,
            tag: self.tag.clone(),
            include_removed: self.include_removed,
            order: if self.topo {
                ListOrder::Topological
            } else {
                ListOrder::Default
            },
        }
    }
}

pub fn run_list(args: &ListArgs, session: &Session) -> anyhow::Result<()> {
    let graph = session.store.load()?;
    let mut filter = args.filter();
    if let Some(seed) = &args.component {
        filter.component_of = Some(graph.resolve_id(seed)?);
    }

    let listing = ops::list_tasks(&graph, filter, session.now())?;
    let now = listing.now();
    let views: Vec<TaskView<'_>> = listing
        .iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|task| TaskView::new(task, now))
        .collect();
    tracing::debug!(shown = views.len(), matched = listing.len(), "listed tasks");
    render_list(&views, session.output)
}
