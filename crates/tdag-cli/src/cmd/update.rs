//! `td update`: edit fields and links of one task in a single transaction.

use clap::Args;
use serde_json::Value;
use std::io::Write;
use tdag_core::ops::{self, TaskPatch};
use tdag_core::{store, Status, Timestamp};

use super::{resolve_all, Session};
use crate::output::{self, render_mode, CliError, TaskView};
use crate::validate;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Task id or unique prefix.
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(short, long, allow_negative_numbers = true)]
    pub priority: Option<i64>,

    #[arg(long, value_parser = validate::parse_timestamp, conflicts_with = "clear_start")]
    pub start: Option<Timestamp>,

    #[arg(long)]
    pub clear_start: bool,

    #[arg(long, value_parser = validate::parse_timestamp, conflicts_with = "clear_due")]
    pub due: Option<Timestamp>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, value_parser = validate::parse_status)]
    pub status: Option<Status>,

    /// Assign to someone.
    #[arg(long, conflicts_with = "unassign")]
    pub assign: Option<String>,

    #[arg(long)]
    pub unassign: bool,

    #[arg(long)]
    pub requested_by: Option<String>,

    /// Replace the request note verbatim.
    #[arg(long)]
    pub requested_note: Option<String>,

    /// Add tags (comma-separated or repeated).
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub add_tags: Vec<String>,

    /// Remove tags.
    #[arg(long = "untag", value_delimiter = ',')]
    pub remove_tags: Vec<String>,

    /// Set metadata entries as key=value.
    #[arg(long = "meta", value_parser = validate::parse_metadata, value_name = "KEY=VALUE")]
    pub metadata: Vec<(String, Value)>,

    /// Remove metadata keys.
    #[arg(long = "unmeta", value_name = "KEY")]
    pub remove_metadata: Vec<String>,

    #[arg(long = "add-parent", value_delimiter = ',', value_name = "ID")]
    pub add_parents: Vec<String>,

    #[arg(long = "remove-parent", value_delimiter = ',', value_name = "ID")]
    pub remove_parents: Vec<String>,

    #[arg(long = "add-child", value_delimiter = ',', value_name = "ID")]
    pub add_children: Vec<String>,

    #[arg(long = "remove-child", value_delimiter = ',', value_name = "ID")]
    pub remove_children: Vec<String>,
}

impl UpdateArgs {
    fn validate(&self) -> Result<(), validate::ValidationError> {
        if let Some(title) = &self.title {
            validate::validate_title(title)?;
        }
        self.add_tags.iter().try_for_each(|t| validate::validate_tag(t))
    }

    /// The field part of the patch; links are resolved against the snapshot
    /// later.
    fn fields(&self) -> TaskPatch {
        let clearable = |value: Option<Timestamp>, clear: bool| {
            if clear { Some(None) } else { value.map(Some) }
        };
        let mut metadata: std::collections::BTreeMap<String, Option<Value>> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();
        for key in &self.remove_metadata {
            metadata.insert(key.clone(), None);
        }

        TaskPatch {
            title: self.title.clone(),
            description: if self.clear_description {
                Some(None)
            } else {
                self.description.clone().map(Some)
            },
            priority: self.priority,
            start_date: clearable(self.start, self.clear_start),
            due_date: clearable(self.due, self.clear_due),
            status: self.status,
            assigned_to: if self.unassign {
                Some(None)
            } else {
                self.assign.clone().map(Some)
            },
            requested_by: self.requested_by.clone().map(Some),
            requested_note: self.requested_note.clone().map(Some),
            add_tags: self.add_tags.clone(),
            remove_tags: self.remove_tags.clone(),
            metadata,
            ..TaskPatch::default()
        }
    }

    fn has_links(&self) -> bool {
        !(self.add_parents.is_empty()
            && self.remove_parents.is_empty()
            && self.add_children.is_empty()
            && self.remove_children.is_empty())
    }
}

pub fn run_update(args: &UpdateArgs, session: &Session) -> anyhow::Result<()> {
    args.validate()?;
    let fields = args.fields();
    if fields.is_empty() && !args.has_links() {
        return Err(CliError::new("nothing to update")
            .with_suggestion("pass at least one field flag, e.g. --title or --add-parent")
            .into());
    }

    let ctx = session.ops();
    let task = store::transact(session.store.as_ref(), |graph| {
        let id = graph.resolve_id(&args.id)?;
        let patch = TaskPatch {
            add_parents: resolve_all(graph, &args.add_parents)?,
            remove_parents: resolve_all(graph, &args.remove_parents)?,
            add_children: resolve_all(graph, &args.add_children)?,
            remove_children: resolve_all(graph, &args.remove_children)?,
            ..fields
        };
        ops::update_task(graph, &ctx, id.as_str(), patch)?;
        Ok(graph.require(id.as_str())?.clone())
    })?;

    let view = TaskView::new(&task, session.now());
    render_mode(
        session.output,
        &view,
        |v, w| writeln!(w, "{}", v.task.id),
        |v, w| writeln!(w, "✓ Updated {}  {}", output::short_id(&v.task.id), v.task.title),
    )
}
