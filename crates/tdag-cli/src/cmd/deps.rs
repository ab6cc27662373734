//! Read-only dependency views.
//!
//! - `td deps`: raw parent and child ids as stored on the task.
//! - `td reason`: direct parents and children with titles and statuses.
//! - `td blocked`: every ancestor with its completion state. Advisory only.

use clap::Args;
use serde::Serialize;
use std::io::Write;
use tdag_core::graph::blocking;
use tdag_core::ops::{self, Blocker, LinkedTask};
use tdag_core::TaskId;

use super::Session;
use crate::output::{self, pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct DepsArgs {
    /// Task id or unique prefix.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct BlockedArgs {
    /// Task id or unique prefix.
    pub id: String,

    /// Only ancestors that are still open.
    #[arg(long)]
    pub open: bool,
}

#[derive(Debug, Serialize)]
struct RawLinks {
    id: TaskId,
    depends_on: Vec<TaskId>,
    children: Vec<TaskId>,
}

pub fn run_deps(args: &DepsArgs, session: &Session) -> anyhow::Result<()> {
    let task = session.store.get_task(&args.id)?;
    let links = RawLinks {
        id: task.id,
        depends_on: task.depends_on,
        children: task.children,
    };
    render(session.output, &links, |l, w| {
        writeln!(w, "depends_on:")?;
        for id in &l.depends_on {
            writeln!(w, "  {id}")?;
        }
        writeln!(w, "children:")?;
        for id in &l.children {
            writeln!(w, "  {id}")?;
        }
        Ok(())
    })
}

fn linked_line(w: &mut dyn Write, link: &LinkedTask) -> std::io::Result<()> {
    match (&link.title, link.status) {
        (Some(title), Some(status)) => writeln!(w, "  - {} [{status}] {title}", link.id),
        _ => writeln!(w, "  - {} (missing)", link.id),
    }
}

pub fn run_reason(args: &DepsArgs, session: &Session) -> anyhow::Result<()> {
    let info = session.store.dependency_info(&args.id)?;
    render_mode(
        session.output,
        &info,
        |i, w| {
            writeln!(w, "parents:")?;
            i.parents.iter().try_for_each(|p| linked_line(w, p))?;
            writeln!(w, "children:")?;
            i.children.iter().try_for_each(|c| linked_line(w, c))
        },
        |i, w| {
            pretty_section(w, &format!("{}  {} [{}]", i.id, i.title, i.status))?;
            writeln!(w, "Depends on ({}):", i.parents.len())?;
            i.parents.iter().try_for_each(|p| linked_line(w, p))?;
            writeln!(w, "Needed by ({}):", i.children.len())?;
            i.children.iter().try_for_each(|c| linked_line(w, c))
        },
    )
}

#[derive(Debug, Serialize)]
struct BlockedReport {
    id: TaskId,
    open: usize,
    ancestors: Vec<Blocker>,
}

pub fn run_blocked(args: &BlockedArgs, session: &Session) -> anyhow::Result<()> {
    let graph = session.store.load()?;
    let id = graph.resolve_id(&args.id)?;
    let ancestors = if args.open {
        blocking::open_blockers(&graph, id.as_str())?
    } else {
        ops::blocked_by(&graph, id.as_str())?
    };
    let report = BlockedReport {
        open: ancestors.iter().filter(|b| !b.done).count(),
        id,
        ancestors,
    };

    render_mode(
        session.output,
        &report,
        |r, w| {
            for b in &r.ancestors {
                writeln!(w, "{}\t{}\t{}\t{}", b.depth, b.id, b.status, b.title)?;
            }
            Ok(())
        },
        |r, w| {
            if r.ancestors.is_empty() {
                return writeln!(w, "{} has no upstream tasks", output::short_id(&r.id));
            }
            pretty_section(
                w,
                &format!("{}: {} open of {} upstream", output::short_id(&r.id), r.open, r.ancestors.len()),
            )?;
            for b in &r.ancestors {
                let mark = if b.done { '✓' } else { '·' };
                let indent = "  ".repeat(b.depth.saturating_sub(1));
                writeln!(w, "{indent}{mark} {} [{}] {}", output::short_id(&b.id), b.status, b.title)?;
            }
            Ok(())
        },
    )
}
