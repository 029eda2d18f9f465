// src/dag/state.rs

//! Per-run task state and the snapshot types built from it.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::dag::task::TaskSpec;
use crate::engine::{RunParams, TaskId};

/// State of one task within a run.
///
/// Terminal states are `Succeeded`, `Failed`, `UpstreamFailed` and
/// `Skipped`; a run is finished when no task is `Pending` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for dependencies and a free execution slot.
    Pending,
    /// Dispatched to the executor; also held through a retry wait.
    Running,
    Succeeded,
    /// All attempts exhausted.
    Failed,
    /// A declared upstream task failed; never attempted.
    UpstreamFailed,
    /// Removed from the run by cancellation.
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// Mutable per-run bookkeeping for one task. Owned by the scheduler; only
/// the driver loop writes it.
#[derive(Debug, Clone)]
pub(crate) struct TaskRun {
    pub state: TaskState,
    /// Number of attempts dispatched so far.
    pub attempts: u32,
    /// Error text of the most recent failed attempt.
    pub last_error: Option<String>,
}

impl TaskRun {
    pub fn fresh() -> Self {
        Self {
            state: TaskState::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Description of one attempt the scheduler wants executed now.
#[derive(Debug, Clone)]
pub struct ScheduledAttempt {
    pub task: TaskId,
    pub action: crate::dag::task::Action,
    /// 1-based attempt number for this task within the run.
    pub attempt: u32,
    /// Run this attempt belongs to; stale completions are matched against it.
    pub run_id: u64,
    /// Optional wall-clock budget; expiry counts as a failed attempt.
    pub timeout: Option<Duration>,
    /// Run-scoped parameters, passed through to the action untouched.
    pub params: RunParams,
}

impl ScheduledAttempt {
    pub(crate) fn new(spec: &TaskSpec, attempt: u32, run_id: u64, params: RunParams) -> Self {
        Self {
            task: spec.id.clone(),
            action: spec.action.clone(),
            attempt,
            run_id,
            timeout: spec.timeout,
            params,
        }
    }
}

/// Overall outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// At least one task ended `Failed` or `UpstreamFailed`.
    Failed,
    /// The run was cancelled before finishing.
    Cancelled,
}

/// Snapshot of one task for status queries and the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Point-in-time view of a run: every task's state and attempt count.
#[derive(Debug, Clone)]
pub struct RunStatus {
    pub run_id: u64,
    pub tasks: BTreeMap<TaskId, TaskStatus>,
}

impl RunStatus {
    /// Whether every task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|t| t.state.is_terminal())
    }
}

/// Final report of a finished run, enumerating every task's terminal state
/// and, for failed tasks, the last execution error encountered.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    pub workflow: String,
    pub outcome: RunOutcome,
    pub tasks: BTreeMap<TaskId, TaskStatus>,
}

impl RunReport {
    pub fn task(&self, id: &str) -> Option<&TaskStatus> {
        self.tasks.get(id)
    }
}
