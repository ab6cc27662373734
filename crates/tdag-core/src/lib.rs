//! tdag-core library.
//!
//! A personal task list modeled as a directed acyclic graph. Tasks are nodes;
//! an edge `a -> b` means `b` depends on `a`.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums from [`error`]; every variant maps
//!   to a stable [`error::ErrorCode`].
//! - **Logging**: `tracing` macros only. This crate never installs a
//!   subscriber.
//! - **Purity**: [`graph`], [`order`] and [`ops`] never touch the file
//!   system. [`store`] is the only module that does.

pub mod clock;
pub mod error;
pub mod graph;
pub mod lock;
pub mod model;
pub mod ops;
pub mod order;
pub mod store;

pub use clock::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
pub use error::{ErrorCode, GraphError, ModelError, StoreError};
pub use graph::TaskGraph;
pub use model::{Edge, Status, Task, TaskDraft, TaskId, Timestamp};
pub use ops::OpsContext;
pub use store::Store;
