//! `td insert`: split an existing edge `A -> B` with a new task.

use clap::Args;
use std::io::Write;
use tdag_core::{ops, store, TaskDraft, TaskId};

use super::Session;
use crate::output::{self, render_mode};
use crate::validate;

#[derive(Args, Debug)]
pub struct InsertArgs {
    /// Parent end of the edge.
    pub a: String,
    /// Child end of the edge.
    pub b: String,

    /// Title of the new task.
    #[arg(long)]
    pub title: String,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i64,

    #[arg(short, long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Use this id instead of generating one.
    #[arg(long, value_parser = validate::parse_task_id)]
    pub id: Option<TaskId>,
}

#[derive(Debug, PartialEq, Eq, serde::Serialize)]
struct Inserted {
    id: TaskId,
    parent: Option<TaskId>,
    child: Option<TaskId>,
}

fn insert(args: &InsertArgs, session: &Session) -> anyhow::Result<Inserted> {
    validate::validate_title(&args.title)?;
    for tag in &args.tags {
        validate::validate_tag(tag)?;
    }

    let draft = TaskDraft {
        id: args.id.clone(),
        title: args.title.clone(),
        description: args.description.clone(),
        priority: args.priority,
        tags: args.tags.iter().cloned().collect(),
        ..TaskDraft::default()
    };
    let ctx = session.ops();
    let inserted = store::transact(session.store.as_ref(), |graph| {
        let a = graph.resolve_id(&args.a)?;
        let b = graph.resolve_id(&args.b)?;
        let id = ops::insert_between(graph, &ctx, a.as_str(), b.as_str(), draft)?;
        // The new task's first parent and first child are the edge ends.
        let task = graph.require(id.as_str())?;
        Ok(Inserted {
            parent: task.depends_on.first().cloned(),
            child: task.children.first().cloned(),
            id,
        })
    })?;
    Ok(inserted)
}

pub fn run_insert(args: &InsertArgs, session: &Session) -> anyhow::Result<()> {
    let inserted = insert(args, session)?;
    render_mode(
        session.output,
        &inserted,
        |i, w| writeln!(w, "{}", i.id),
        |i, w| {
            let end = |id: &Option<TaskId>| id.as_ref().map_or("?", output::short_id).to_string();
            writeln!(
                w,
                "✓ Inserted {} between {} and {}",
                output::short_id(&i.id),
                end(&i.parent),
                end(&i.child)
            )
        },
    )
}
