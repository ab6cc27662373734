//! `td show`: full details of one task. Accepts a unique id prefix.

use clap::Args;

use super::Session;
use crate::output::{pretty_task, render_mode, text_task, TaskView};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task id or unique prefix.
    pub id: String,
}

pub fn run_show(args: &ShowArgs, session: &Session) -> anyhow::Result<()> {
    let task = session.store.get_task(&args.id)?;
    let view = TaskView::new(&task, session.now());
    render_mode(
        session.output,
        &view,
        |v, w| text_task(w, v),
        |v, w| pretty_task(w, v),
    )
}
