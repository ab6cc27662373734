//! `td rm`: soft-remove a task, or delete it outright with `--hard`.

use clap::Args;
use std::io::Write;
use tdag_core::{ops, store};

use super::Session;
use crate::output::{self, render_mode};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Task id or unique prefix.
    pub id: String,

    /// Delete the task and strip every edge that mentions it.
    #[arg(long)]
    pub hard: bool,
}

#[derive(Debug, serde::Serialize)]
struct Removed {
    id: tdag_core::TaskId,
    title: String,
    hard: bool,
}

pub fn run_rm(args: &RmArgs, session: &Session) -> anyhow::Result<()> {
    let ctx = session.ops();
    let removed = store::transact(session.store.as_ref(), |graph| {
        let id = graph.resolve_id(&args.id)?;
        let title = if args.hard {
            ops::delete_task(graph, &ctx, id.as_str())?.title
        } else {
            ops::remove_task(graph, &ctx, id.as_str())?;
            graph.require(id.as_str())?.title.clone()
        };
        Ok(Removed {
            id,
            title,
            hard: args.hard,
        })
    })?;

    render_mode(
        session.output,
        &removed,
        |r, w| writeln!(w, "{}", r.id),
        |r, w| {
            let verb = if r.hard { "Deleted" } else { "Removed" };
            writeln!(w, "✓ {verb} {}  {}", output::short_id(&r.id), r.title)
        },
    )
}
