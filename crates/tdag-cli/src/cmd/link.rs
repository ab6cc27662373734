//! `td link` / `td unlink`: add or remove one dependency edge.

use clap::Args;
use std::io::Write;
use tdag_core::Edge;

use super::Session;
use crate::output::render_mode;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// The task that must come first.
    pub parent: String,
    /// The task that depends on it.
    pub child: String,
}

pub fn run_link(args: &LinkArgs, session: &Session) -> anyhow::Result<()> {
    let edge = session
        .store
        .link(&session.ops(), &args.parent, &args.child)?;
    render_edge(session, &edge, "Linked")
}

pub fn run_unlink(args: &LinkArgs, session: &Session) -> anyhow::Result<()> {
    let edge = session
        .store
        .unlink(&session.ops(), &args.parent, &args.child)?;
    render_edge(session, &edge, "Unlinked")
}

fn render_edge(session: &Session, edge: &Edge, verb: &str) -> anyhow::Result<()> {
    render_mode(
        session.output,
        edge,
        |e, w| writeln!(w, "{}\t{}", e.from, e.to),
        |e, w| writeln!(w, "✓ {verb} {e}"),
    )
}
