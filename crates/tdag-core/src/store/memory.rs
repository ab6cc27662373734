//! In-process store for tests and embedding.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use super::{Store, WriteGuard};
use crate::error::StoreError;
use crate::graph::TaskGraph;
use crate::lock::{LockError, DEFAULT_LOCK_TIMEOUT, RETRY_INTERVAL};

/// Keeps the snapshot in memory. Cloned on every load and save, so callers
/// never share a graph with the store.
///
/// Writers wait for each other at most `lock_timeout`, like the file-backed
/// stores.
#[derive(Debug)]
pub struct MemoryStore {
    snapshot: Mutex<TaskGraph>,
    writer: Mutex<()>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_graph(TaskGraph::new())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_graph(graph: TaskGraph) -> Self {
        Self {
            snapshot: Mutex::new(graph),
            writer: Mutex::new(()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

impl Store for MemoryStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<TaskGraph, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, graph: &TaskGraph) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = graph.clone();
        Ok(())
    }

    fn lock(&self) -> Result<WriteGuard<'_>, StoreError> {
        let started = Instant::now();
        loop {
            match self.writer.try_lock() {
                Ok(guard) => return Ok(WriteGuard::Local(guard)),
                Err(TryLockError::Poisoned(poisoned)) => {
                    return Ok(WriteGuard::Local(poisoned.into_inner()));
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        return Err(LockError::Timeout {
                            path: PathBuf::from(self.location()),
                            waited,
                        }
                        .into());
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
            }
        }
    }
}
