//! Task data model.

pub mod task;

pub use task::{Edge, ParseEnumError, Status, Task, TaskDraft, TaskId, Timestamp};
