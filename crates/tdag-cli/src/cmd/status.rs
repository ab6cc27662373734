//! `td done`, `td start` and `td status`: direct status changes.
//!
//! Status changes never consult dependencies: finishing a task whose parents
//! are still open is allowed. `td blocked` explains what is still open.

use clap::Args;
use serde::Serialize;
use std::io::Write;
use tdag_core::{ops, store, Status, TaskId};

use super::Session;
use crate::output::{self, render_mode};
use crate::validate;

#[derive(Args, Debug)]
pub struct DoneArgs {
    /// Task id or unique prefix.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Task id or unique prefix.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Task id or unique prefix.
    pub id: String,

    /// New status: pending, in_progress, done, requested or removed.
    #[arg(value_parser = validate::parse_status)]
    pub status: Status,
}

#[derive(Debug, Serialize)]
struct StatusChange {
    id: TaskId,
    title: String,
    from: Status,
    to: Status,
}

pub fn run_done(args: &DoneArgs, session: &Session) -> anyhow::Result<()> {
    set(session, &args.id, Status::Done)
}

pub fn run_start(args: &StartArgs, session: &Session) -> anyhow::Result<()> {
    set(session, &args.id, Status::InProgress)
}

pub fn run_status(args: &StatusArgs, session: &Session) -> anyhow::Result<()> {
    set(session, &args.id, args.status)
}

fn set(session: &Session, raw_id: &str, status: Status) -> anyhow::Result<()> {
    let ctx = session.ops();
    let change = store::transact(session.store.as_ref(), |graph| {
        let id = graph.resolve_id(raw_id)?;
        let from = graph.require(id.as_str())?.status;
        ops::set_status(graph, &ctx, id.as_str(), status)?;
        let title = graph.require(id.as_str())?.title.clone();
        Ok(StatusChange {
            id,
            title,
            from,
            to: status,
        })
    })?;

    render_mode(
        session.output,
        &change,
        |c, w| writeln!(w, "{}\t{}", c.id, c.to),
        |c, w| {
            writeln!(
                w,
                "✓ {}  {}: {} → {}",
                output::short_id(&c.id),
                c.title,
                c.from,
                c.to
            )
        },
    )
}
