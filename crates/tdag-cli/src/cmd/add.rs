//! `td add`: create a task, optionally wired to existing parents and children.

use clap::Args;
use serde_json::Value;
use std::io::Write;
use tdag_core::store;
use tdag_core::{ops, Status, TaskDraft, TaskId, Timestamp};

use super::{resolve_all, Session};
use crate::output::{self, render_mode, TaskView};
use crate::validate;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Title of the new task.
    pub title: String,

    /// Longer description.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority; higher sorts first.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i64,

    /// Start date (RFC 3339 or YYYY-MM-DD). Future start dates sink in listings.
    #[arg(long, value_parser = validate::parse_timestamp)]
    pub start: Option<Timestamp>,

    /// Due date (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = validate::parse_timestamp)]
    pub due: Option<Timestamp>,

    /// Initial status.
    #[arg(long, value_parser = validate::parse_status, default_value = "pending")]
    pub status: Status,

    /// Use this id instead of generating one.
    #[arg(long, value_parser = validate::parse_task_id)]
    pub id: Option<TaskId>,

    /// Parents the new task depends on (comma-separated or repeated).
    #[arg(long = "depends-on", value_delimiter = ',', value_name = "ID")]
    pub depends_on: Vec<String>,

    /// Existing tasks that should depend on the new one.
    #[arg(long = "child", value_delimiter = ',', value_name = "ID")]
    pub children: Vec<String>,

    /// Tags to attach (comma-separated or repeated).
    #[arg(short, long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Metadata entries as key=value; values are read as YAML scalars.
    #[arg(long = "meta", value_parser = validate::parse_metadata, value_name = "KEY=VALUE")]
    pub metadata: Vec<(String, Value)>,

    /// Assign the task to someone.
    #[arg(long)]
    pub assign: Option<String>,
}

impl AddArgs {
    fn validate(&self) -> Result<(), validate::ValidationError> {
        validate::validate_title(&self.title)?;
        self.tags.iter().try_for_each(|t| validate::validate_tag(t))
    }

    fn draft(&self) -> TaskDraft {
        TaskDraft {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            start_date: self.start,
            due_date: self.due,
            status: self.status,
            assigned_to: self.assign.clone(),
            tags: self.tags.iter().cloned().collect(),
            metadata: self.metadata.iter().cloned().collect(),
            ..TaskDraft::default()
        }
    }
}

pub fn run_add(args: &AddArgs, session: &Session) -> anyhow::Result<()> {
    args.validate()?;

    let ctx = session.ops();
    let task = store::transact(session.store.as_ref(), |graph| {
        let mut draft = args.draft();
        draft.parents = resolve_all(graph, &args.depends_on)?;
        draft.children = resolve_all(graph, &args.children)?;
        let id = ops::add_task(graph, &ctx, draft)?;
        Ok(graph.require(id.as_str())?.clone())
    })?;

    let view = TaskView::new(&task, session.now());
    render_mode(
        session.output,
        &view,
        |v, w| writeln!(w, "{}", v.task.id),
        |v, w| {
            writeln!(w, "✓ Added {}  {}", output::short_id(&v.task.id), v.task.title)?;
            writeln!(w, "  id: {}", v.task.id)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: AddArgs,
    }

    #[test]
    fn defaults() {
        let w = Wrapper::parse_from(["test", "Write docs"]);
        assert_eq!(w.args.title, "Write docs");
        assert_eq!(w.args.priority, 0);
        assert_eq!(w.args.status, Status::Pending);
        assert!(w.args.depends_on.is_empty());
        assert!(w.args.id.is_none());
    }

    #[test]
    fn lists_split_on_commas_and_repeat() {
        let w = Wrapper::parse_from([
            "test", "x", "--depends-on", "a,b", "--depends-on", "c", "-t", "ui,ux", "-p", "-2",
        ]);
        assert_eq!(w.args.depends_on, vec!["a", "b", "c"]);
        assert_eq!(w.args.tags, vec!["ui", "ux"]);
        assert_eq!(w.args.priority, -2);
    }

    #[test]
    fn draft_carries_every_field() {
        let w = Wrapper::parse_from([
            "test", "x", "--due", "2024-05-01", "--meta", "points=3", "--assign", "sam",
            "--status", "doing",
        ]);
        let draft = w.args.draft();
        assert_eq!(draft.due_date, Some(Timestamp::parse("2024-05-01").unwrap()));
        assert_eq!(draft.metadata["points"], serde_json::json!(3));
        assert_eq!(draft.assigned_to.as_deref(), Some("sam"));
        assert_eq!(draft.status, Status::InProgress);
    }

    #[test]
    fn bad_tag_is_rejected_before_touching_the_store() {
        let w = Wrapper::parse_from(["test", "x", "--tag", "has space"]);
        assert!(w.args.validate().is_err());
    }
}
