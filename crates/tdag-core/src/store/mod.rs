//! Storage contract and its backends.
//!
//! A [`Store`] persists whole [`TaskGraph`] snapshots. Backends provide
//! [`Store::load`], [`Store::save`] and [`Store::lock`]; every use-case method
//! has a default implementation that runs the matching [`crate::ops`]
//! function inside [`transact`] (lock, load, mutate, save). Backends with a
//! native way to answer a query, such as SQLite's recursive component query,
//! override the default.
//!
//! # Guarantees
//!
//! - `save` is atomic: a crash mid-save never leaves a snapshot that `load`
//!   misreads.
//! - [`Store::lock`] gives single-writer exclusion across threads and, for
//!   file backends, across processes. Acquisition fails fast with
//!   [`LockError::Timeout`](crate::lock::LockError::Timeout).
//! - Every `Task` field survives a save/load cycle, including empty
//!   collections, absent optionals and one-sided edges.

pub mod exchange;
pub mod memory;
pub mod sqlite;
pub mod yaml;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::MutexGuard;

use crate::error::StoreError;
use crate::graph::blocking::DependencyInfo;
use crate::graph::{blocking, components, TaskGraph};
use crate::lock::StoreLock;
use crate::model::{Edge, Task, TaskDraft, TaskId};
use crate::ops::{self, OpsContext, TaskPatch};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use yaml::YamlStore;

/// Proof that the caller holds the store's writer exclusion.
///
/// Released on drop.
#[derive(Debug)]
pub enum WriteGuard<'a> {
    /// Advisory lock on a sibling lock file.
    File(StoreLock),
    /// In-process exclusion for stores without a backing file.
    Local(MutexGuard<'a, ()>),
}

/// A persistence backend for task graph snapshots.
pub trait Store {
    /// Short human-readable description of where data lives.
    fn location(&self) -> String;

    /// Read the full snapshot. Drift between edge sides is loaded as-is;
    /// duplicate ids are rejected as corrupt data.
    ///
    /// # Errors
    ///
    /// Backend I/O failures and unreadable snapshots.
    fn load(&self) -> Result<TaskGraph, StoreError>;

    /// Replace the persisted snapshot atomically.
    ///
    /// # Errors
    ///
    /// Backend I/O failures. On error the previous snapshot is intact.
    fn save(&self, graph: &TaskGraph) -> Result<(), StoreError>;

    /// Acquire exclusive writer access.
    ///
    /// # Errors
    ///
    /// [`StoreError::Lock`] when another writer holds it past the timeout.
    fn lock(&self) -> Result<WriteGuard<'_>, StoreError>;

    /// Look up one task by full id or unique prefix.
    ///
    /// # Errors
    ///
    /// [`StoreError::Graph`] wrapping `UnknownId` or `AmbiguousId`.
    fn get_task(&self, id: &str) -> Result<Task, StoreError> {
        let graph = self.load()?;
        let id = graph.resolve_id(id)?;
        Ok(graph.require(id.as_str())?.clone())
    }

    /// Every task, in id order.
    ///
    /// # Errors
    ///
    /// As [`Store::load`].
    fn get_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.load()?.into_tasks())
    }

    /// # Errors
    ///
    /// As [`ops::add_task`], plus storage failures.
    fn add_task(&self, ctx: &OpsContext<'_>, draft: TaskDraft) -> Result<TaskId, StoreError> {
        transact(self, |graph| ops::add_task(graph, ctx, draft))
    }

    /// # Errors
    ///
    /// As [`ops::update_task`], plus storage failures.
    fn update_task(
        &self,
        ctx: &OpsContext<'_>,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Task, StoreError> {
        transact(self, |graph| {
            let id = graph.resolve_id(id)?;
            ops::update_task(graph, ctx, id.as_str(), patch)?;
            Ok(graph.require(id.as_str())?.clone())
        })
    }

    /// Soft removal.
    ///
    /// # Errors
    ///
    /// As [`ops::remove_task`], plus storage failures.
    fn remove_task(&self, ctx: &OpsContext<'_>, id: &str) -> Result<(), StoreError> {
        transact(self, |graph| {
            let id = graph.resolve_id(id)?;
            ops::remove_task(graph, ctx, id.as_str())
        })
    }

    /// # Errors
    ///
    /// As [`ops::link`], plus storage failures.
    fn link(&self, ctx: &OpsContext<'_>, parent: &str, child: &str) -> Result<Edge, StoreError> {
        transact(self, |graph| {
            let parent = graph.resolve_id(parent)?;
            let child = graph.resolve_id(child)?;
            ops::link(graph, ctx, parent.as_str(), child.as_str())
        })
    }

    /// # Errors
    ///
    /// As [`ops::unlink`], plus storage failures.
    fn unlink(&self, ctx: &OpsContext<'_>, parent: &str, child: &str) -> Result<Edge, StoreError> {
        transact(self, |graph| {
            let parent = graph.resolve_id(parent)?;
            let child = graph.resolve_id(child)?;
            ops::unlink(graph, ctx, parent.as_str(), child.as_str())
        })
    }

    /// The weakly-connected component containing `id`.
    ///
    /// # Errors
    ///
    /// `UnknownId` when the seed does not exist, plus storage failures.
    fn component(&self, id: &str) -> Result<BTreeSet<TaskId>, StoreError> {
        let graph = self.load()?;
        let id = graph.resolve_id(id)?;
        Ok(components::component_of(&graph, id.as_str())?)
    }

    /// # Errors
    ///
    /// `UnknownId` when the task does not exist, plus storage failures.
    fn dependency_info(&self, id: &str) -> Result<DependencyInfo, StoreError> {
        let graph = self.load()?;
        let id = graph.resolve_id(id)?;
        Ok(blocking::dependency_info(&graph, id.as_str())?)
    }

    /// Split `a -> b` with a new task as one durable step.
    ///
    /// # Errors
    ///
    /// As [`ops::insert_between`], plus storage failures.
    fn insert_between(
        &self,
        ctx: &OpsContext<'_>,
        a: &str,
        b: &str,
        draft: TaskDraft,
    ) -> Result<TaskId, StoreError> {
        transact(self, |graph| {
            let a = graph.resolve_id(a)?;
            let b = graph.resolve_id(b)?;
            ops::insert_between(graph, ctx, a.as_str(), b.as_str(), draft)
        })
    }
}

/// Run one load-mutate-save cycle under the store's writer lock.
///
/// The snapshot is saved only when `op` succeeds; on failure nothing is
/// written and the graph error is returned as [`StoreError::Graph`].
///
/// # Errors
///
/// Lock, load and save failures, or the error returned by `op`.
pub fn transact<S, T, F>(store: &S, op: F) -> Result<T, StoreError>
where
    S: Store + ?Sized,
    F: FnOnce(&mut TaskGraph) -> Result<T, crate::error::GraphError>,
{
    let _guard = store.lock()?;
    let mut graph = store.load()?;
    match op(&mut graph) {
        Ok(value) => {
            store.save(&graph)?;
            tracing::info!(store = %store.location(), tasks = graph.len(), "saved snapshot");
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(store = %store.location(), code = %err.code(), "operation failed, nothing saved");
            Err(err.into())
        }
    }
}

/// Open the backend matching a data file's extension.
///
/// `.yaml`/`.yml` open a [`YamlStore`]; `.db`, `.sqlite` and `.sqlite3`
/// open a [`SqliteStore`]. Returns `None` for any other extension.
#[must_use]
pub fn open_by_extension(path: &Path, lock_timeout: std::time::Duration) -> Option<Box<dyn Store>> {
    let ext = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)?;
    match ext.as_str() {
        "yaml" | "yml" => Some(Box::new(YamlStore::with_lock_timeout(path, lock_timeout))),
        "db" | "sqlite" | "sqlite3" => {
            Some(Box::new(SqliteStore::with_lock_timeout(path, lock_timeout)))
        }
        _ => None,
    }
}

/// Log a warning when a freshly loaded snapshot fails `check`.
pub(crate) fn warn_on_findings(location: &str, graph: &TaskGraph) {
    let report = ops::check(graph);
    if !report.is_clean() {
        tracing::warn!(
            location,
            findings = report.finding_count(),
            "loaded snapshot is inconsistent; run `td check`"
        );
    }
}
