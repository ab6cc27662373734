//! `td archive` / `td restore`: flip the archive flag on a whole connected
//! component. Statuses are left alone.

use clap::Args;
use serde::Serialize;
use std::io::Write;
use tdag_core::{ops, store, TaskId};

use super::Session;
use crate::output::{self, render_mode};

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Any task in the component.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ArchiveResult {
    seed: TaskId,
    archived: bool,
    changed: Vec<TaskId>,
}

pub fn run_archive(args: &ArchiveArgs, session: &Session) -> anyhow::Result<()> {
    flip(args, session, true)
}

pub fn run_restore(args: &ArchiveArgs, session: &Session) -> anyhow::Result<()> {
    flip(args, session, false)
}

fn flip(args: &ArchiveArgs, session: &Session, archived: bool) -> anyhow::Result<()> {
    let ctx = session.ops();
    let result = store::transact(session.store.as_ref(), |graph| {
        let seed = graph.resolve_id(&args.id)?;
        let changed = ops::archive_tree(graph, &ctx, seed.as_str(), archived)?;
        Ok(ArchiveResult {
            seed,
            archived,
            changed,
        })
    })?;

    let verb = if archived { "Archived" } else { "Restored" };
    render_mode(
        session.output,
        &result,
        |r, w| {
            for id in &r.changed {
                writeln!(w, "{id}")?;
            }
            Ok(())
        },
        |r, w| {
            if r.changed.is_empty() {
                writeln!(
                    w,
                    "Nothing to do: the component of {} is already {}",
                    output::short_id(&r.seed),
                    if r.archived { "archived" } else { "active" }
                )
            } else {
                writeln!(w, "✓ {verb} {} task(s)", r.changed.len())?;
                for id in &r.changed {
                    writeln!(w, "  - {id}")?;
                }
                Ok(())
            }
        },
    )
}
