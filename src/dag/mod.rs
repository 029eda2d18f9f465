// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of task specs.
//! - [`task`] defines the static task model: actions, retry policy,
//!   trigger rules.
//! - [`state`] holds per-run state and the snapshot/report types.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready, applies retry policy and propagates failure.

pub mod graph;
pub mod scheduler;
pub mod state;
pub mod task;

pub use graph::{TaskGraph, TopologicalBatches};
pub use scheduler::{Scheduler, SchedulerStep};
pub use state::{RunOutcome, RunReport, RunStatus, ScheduledAttempt, TaskState, TaskStatus};
pub use task::{Action, RetryPolicy, TaskSpec, TriggerRule};
