pub mod add;
pub mod archive;
pub mod check;
pub mod completions;
pub mod deps;
pub mod exchange;
pub mod insert;
pub mod link;
pub mod list;
pub mod request;
pub mod rm;
pub mod show;
pub mod status;
pub mod update;

use tdag_core::clock::Clock;
use tdag_core::store::Store;
use tdag_core::{GraphError, OpsContext, RandomIdGenerator, SystemClock, TaskGraph, TaskId, Timestamp};

use crate::output::OutputMode;

/// Everything a subcommand needs: the opened store, the resolved actor and
/// output mode, and the clock and id source handed to core operations.
pub struct Session {
    pub store: Box<dyn Store>,
    pub output: OutputMode,
    actor: String,
    clock: SystemClock,
    ids: RandomIdGenerator,
}

impl Session {
    pub fn new(store: Box<dyn Store>, actor: String, output: OutputMode) -> Self {
        let ids = RandomIdGenerator::new(&actor);
        Self {
            store,
            output,
            actor,
            clock: SystemClock,
            ids,
        }
    }

    pub fn ops(&self) -> OpsContext<'_> {
        OpsContext::new(&self.clock, &self.ids)
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

/// Resolve several user-supplied ids or prefixes against one snapshot.
pub fn resolve_all(graph: &TaskGraph, raw: &[String]) -> Result<Vec<TaskId>, GraphError> {
    raw.iter().map(|r| graph.resolve_id(r)).collect()
}
