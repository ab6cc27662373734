//! `td export` / `td import`: JSON snapshot exchange.
//!
//! Export never overwrites an existing file. Import validates the incoming
//! snapshot first, then either replaces the stored graph or, with
//! `--merge`, adds only the tasks whose ids are new. A merge that would
//! leave the graph inconsistent saves nothing.

use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tdag_core::store::{self, exchange};
use tdag_core::{ops, GraphError, TaskGraph, TaskId};

use super::Session;
use crate::output::{render, render_mode};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file. Must not exist yet.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file produced by `td export`.
    pub path: PathBuf,

    /// Keep existing tasks and add only new ids instead of replacing.
    #[arg(long)]
    pub merge: bool,
}

#[derive(Debug, Serialize)]
struct Exported {
    path: PathBuf,
    tasks: usize,
}

#[derive(Debug, Serialize)]
struct Imported {
    path: PathBuf,
    merged: bool,
    imported: Vec<TaskId>,
    skipped: Vec<TaskId>,
}

pub fn run_export(args: &ExportArgs, session: &Session) -> anyhow::Result<()> {
    let graph = session.store.load()?;
    let tasks = exchange::export_file(&graph, &args.path)?;
    let exported = Exported {
        path: args.path.clone(),
        tasks,
    };
    render(session.output, &exported, |e, w| {
        writeln!(w, "exported {} task(s) to {}", e.tasks, e.path.display())
    })
}

type Merged = (TaskGraph, Vec<TaskId>, Vec<TaskId>);

/// Add the tasks of `incoming` whose ids are absent from `current`.
/// Returns the merged graph, the added ids and the skipped ids.
fn merge(current: &TaskGraph, incoming: TaskGraph) -> Result<Merged, GraphError> {
    let mut tasks = current.clone().into_tasks();
    let mut imported = Vec::new();
    let mut skipped = Vec::new();
    for task in incoming.into_tasks() {
        if current.contains(task.id.as_str()) {
            skipped.push(task.id);
        } else {
            imported.push(task.id.clone());
            tasks.push(task);
        }
    }
    let merged = TaskGraph::from_tasks(tasks)?;
    ops::ensure_valid(&merged)?;
    Ok((merged, imported, skipped))
}

pub fn run_import(args: &ImportArgs, session: &Session) -> anyhow::Result<()> {
    let incoming = exchange::import_file(&args.path)?;

    let result = store::transact(session.store.as_ref(), |graph| {
        let (next, imported, skipped) = if args.merge {
            merge(graph, incoming)?
        } else {
            let imported: Vec<TaskId> = incoming.ids().cloned().collect();
            (incoming, imported, Vec::new())
        };
        *graph = next;
        Ok(Imported {
            path: args.path.clone(),
            merged: args.merge,
            imported,
            skipped,
        })
    })?;

    render_mode(
        session.output,
        &result,
        |r, w| {
            for id in &r.imported {
                writeln!(w, "imported\t{id}")?;
            }
            for id in &r.skipped {
                writeln!(w, "skipped\t{id}")?;
            }
            Ok(())
        },
        |r, w| {
            let mode = if r.merged { "merged" } else { "replaced snapshot with" };
            writeln!(w, "✓ {mode} {} task(s) from {}", r.imported.len(), r.path.display())?;
            if !r.skipped.is_empty() {
                writeln!(w, "  skipped {} existing id(s)", r.skipped.len())?;
            }
            Ok(())
        },
    )
}
