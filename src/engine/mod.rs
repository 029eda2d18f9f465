// src/engine/mod.rs

//! Orchestration engine for taskdag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the run queue (what happens when triggers arrive while a run is active)
//! - the main runtime event loop that reacts to:
//!   - run triggers
//!   - attempt completion events
//!   - retry timers firing
//!   - cancellation requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::collections::BTreeMap;
use std::sync::Arc;

/// Canonical task id type used throughout the engine.
pub type TaskId = String;

/// Run-scoped parameters: opaque key/value strings passed through to every
/// attempt of the run. Shared, since every attempt carries them.
pub type RunParams = Arc<BTreeMap<String, String>>;

/// Build [`RunParams`] from key/value pairs.
pub fn run_params<I, K, V>(pairs: I) -> RunParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    Arc::new(
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

/// Outcome of a single executor attempt, as reported back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// The attempt failed; `error` is surfaced in the run report if this
    /// ends up being the task's last attempt.
    Failed { error: String },
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once there is no active run and no queued
    /// trigger (single-shot CLI mode).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from triggers, executors and timers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Start a run of the graph with the given parameters (queued if a run
    /// is already active).
    RunTriggered { params: RunParams },
    /// An executor attempt finished with a concrete outcome.
    AttemptFinished {
        task: TaskId,
        outcome: AttemptOutcome,
    },
    /// A retry delay elapsed; the task's next attempt is due.
    RetryDue { task: TaskId },
    /// Cancel the active run (e.g. Ctrl-C); non-terminal tasks are skipped.
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::RunQueue;
pub use runtime::Runtime;
