//! `td request`: hand a task to someone and track how long it has been out.

use clap::Args;
use std::io::Write;
use tdag_core::ops::{self, RequestDetails};
use tdag_core::{store, Timestamp};

use super::Session;
use crate::output::{self, render_mode, TaskView};
use crate::validate;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Task id or unique prefix.
    pub id: String,

    /// Who the task is handed to.
    #[arg(long)]
    pub to: String,

    /// Who is asking. Defaults to the current user.
    #[arg(long)]
    pub by: Option<String>,

    /// Free-form note, stored with a request marker.
    #[arg(long)]
    pub note: Option<String>,

    /// Expected completion date; replaces the task's due date.
    #[arg(long, value_parser = validate::parse_timestamp)]
    pub due: Option<Timestamp>,
}

pub fn run_request(args: &RequestArgs, session: &Session) -> anyhow::Result<()> {
    let ctx = session.ops();
    let details = RequestDetails {
        to: Some(args.to.clone()),
        by: args.by.clone().unwrap_or_else(|| session.actor().to_string()),
        note: args.note.clone(),
        due: args.due,
    };

    let task = store::transact(session.store.as_ref(), |graph| {
        let id = graph.resolve_id(&args.id)?;
        ops::request(graph, &ctx, id.as_str(), details)?;
        Ok(graph.require(id.as_str())?.clone())
    })?;

    let view = TaskView::new(&task, session.now());
    render_mode(
        session.output,
        &view,
        |v, w| {
            writeln!(
                w,
                "{}\t{}",
                v.task.id,
                v.task.assigned_to.as_deref().unwrap_or_default()
            )
        },
        |v, w| {
            writeln!(
                w,
                "✓ Requested {}  {} → {}",
                output::short_id(&v.task.id),
                v.task.title,
                v.task.assigned_to.as_deref().unwrap_or_default()
            )
        },
    )
}
