//! Background task orchestration
//!
//! A task runs one to N theories for the same query on a fixed-size worker
//! pool. Each theory reports into its task under the task's own lock; the
//! task completes when all N succeeded and fails on the first failure.

mod core;
mod id;
mod pool;
pub mod runner;
mod store;
mod task;

pub use self::core::TaskOrchestrator;
pub use id::TaskId;
pub use pool::{Job, WorkerPool};
pub use runner::TheoryRunner;
pub use store::{InMemoryTaskStore, TaskHandle, TaskStore, lock_task};
pub use task::{Outcome, RESULT_SEPARATOR, StoreError, SubResult, Task, TaskStatus, TaskView};
