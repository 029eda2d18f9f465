// src/dag/scheduler.rs

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::state::{
    RunOutcome, RunReport, RunStatus, ScheduledAttempt, TaskRun, TaskState, TaskStatus,
};
use crate::dag::task::TriggerRule;
use crate::engine::{AttemptOutcome, RunParams, TaskId};

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - deciding when a task is ready to run (trigger rule satisfied, slot free)
/// - bounding how many attempts execute at once
/// - counting attempts and deciding between retry and permanent failure
/// - propagating failure to downstream tasks
/// - detecting run completion and producing the final report
///
/// The state table is mutated only through this type; the driver loop is the
/// single writer.
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    workflow: String,
    max_concurrency: usize,
    /// Per-run state, reset by `start_run`. BTreeMap so dispatch order is
    /// deterministic for equal readiness.
    runs: BTreeMap<TaskId, TaskRun>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    params: RunParams,
    cancelled: bool,
}

/// Structured result of a single scheduler step.
///
/// Tests that manually step the scheduler can make assertions about exactly
/// what changed; the runtime turns these fields into commands.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Attempts that should be handed to the executor now.
    pub newly_scheduled: Vec<ScheduledAttempt>,
    /// Tasks whose failed attempt should be retried after the given delay.
    pub retries: Vec<(TaskId, Duration)>,
    /// Tasks newly marked `UpstreamFailed` in this step.
    pub newly_upstream_failed: Vec<TaskId>,
    /// Present when this step finished the run.
    pub finished: Option<RunReport>,
}

impl Scheduler {
    pub fn new(graph: TaskGraph, workflow: impl Into<String>, max_concurrency: usize) -> Self {
        Self {
            graph,
            workflow: workflow.into(),
            max_concurrency: max_concurrency.max(1),
            runs: BTreeMap::new(),
            run_counter: 0,
            current_run_id: None,
            params: RunParams::default(),
            cancelled: false,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Snapshot of the active (or most recent) run.
    pub fn status(&self) -> Option<RunStatus> {
        if self.runs.is_empty() {
            return None;
        }
        Some(RunStatus {
            run_id: self.run_counter,
            tasks: self.status_table(),
        })
    }

    /// Read-only view of the given task's state in the active run.
    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.runs.get(task).map(|r| r.state)
    }

    /// Start a new run over the whole graph, resetting all per-run state.
    ///
    /// Returns the first wave of ready attempts (the DAG roots, bounded by
    /// `max_concurrency`).
    pub fn start_run(&mut self, params: RunParams) -> SchedulerStep {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.params = params;
        self.cancelled = false;

        self.runs = self
            .graph
            .tasks()
            .map(|id| (id.to_string(), TaskRun::fresh()))
            .collect();

        info!(
            run_id = self.run_counter,
            workflow = %self.workflow,
            tasks = self.runs.len(),
            "starting new run"
        );

        let newly_scheduled = self.dispatch_ready();
        let mut step = SchedulerStep {
            newly_scheduled,
            ..SchedulerStep::default()
        };
        self.maybe_finish(&mut step);
        step
    }

    /// Record the outcome of one executor attempt and advance the run.
    pub fn handle_attempt_result(&mut self, task: &str, outcome: AttemptOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(task = %task, "attempt result with no active run; ignoring");
                return step;
            }
        };

        let Some(run) = self.runs.get_mut(task) else {
            warn!(task = %task, "attempt result for unknown task; ignoring");
            return step;
        };

        // A cancelled or already-terminal task can still produce a late
        // completion from the executor; it no longer owns a state transition.
        if run.state != TaskState::Running {
            debug!(task = %task, state = ?run.state, "stale attempt result; ignoring");
            return step;
        }

        match outcome {
            AttemptOutcome::Success => {
                run.state = TaskState::Succeeded;
                debug!(task = %task, run_id, attempts = run.attempts, "task succeeded");
            }
            AttemptOutcome::Failed { error } => {
                run.last_error = Some(error.clone());

                let limit = self
                    .graph
                    .spec_of(task)
                    .map(|s| s.retry.limit)
                    .unwrap_or(0);

                if run.attempts <= limit {
                    // Attempt budget not exhausted: stay Running and wait out
                    // the retry delay without blocking other dispatches.
                    let delay = self
                        .graph
                        .spec_of(task)
                        .map(|s| s.retry.delay)
                        .unwrap_or(Duration::ZERO);
                    info!(
                        task = %task,
                        run_id,
                        attempt = run.attempts,
                        retry_limit = limit,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed; scheduling retry"
                    );
                    step.retries.push((task.to_string(), delay));
                } else {
                    run.state = TaskState::Failed;
                    warn!(
                        task = %task,
                        run_id,
                        attempts = run.attempts,
                        error = %error,
                        "task failed permanently; failing dependents"
                    );
                    let mut failed = self.mark_dependents_upstream_failed(task);
                    step.newly_upstream_failed.append(&mut failed);
                }
            }
        }

        step.newly_scheduled = self.dispatch_ready();
        self.maybe_finish(&mut step);
        step
    }

    /// A retry delay elapsed; dispatch the next attempt for `task`.
    ///
    /// The task kept its `Running` state (and its concurrency slot) through
    /// the wait, so this never over-subscribes the executor.
    pub fn handle_retry_due(&mut self, task: &str) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                debug!(task = %task, "retry due with no active run; ignoring");
                return step;
            }
        };

        let Some(run) = self.runs.get_mut(task) else {
            warn!(task = %task, "retry due for unknown task; ignoring");
            return step;
        };

        if run.state != TaskState::Running {
            // Cancelled while waiting.
            debug!(task = %task, state = ?run.state, "retry due for non-running task; ignoring");
            return step;
        }

        run.attempts += 1;
        let attempt = run.attempts;
        if let Some(spec) = self.graph.spec_of(task) {
            debug!(task = %task, run_id, attempt, "dispatching retry attempt");
            step.newly_scheduled
                .push(ScheduledAttempt::new(spec, attempt, run_id, self.params.clone()));
        }
        step
    }

    /// Cancel the active run: every non-terminal task becomes `Skipped`.
    ///
    /// Returns the ids of tasks that had an attempt in flight (so the caller
    /// can signal the executor) alongside the closing step.
    pub fn cancel_run(&mut self) -> (Vec<TaskId>, SchedulerStep) {
        let mut step = SchedulerStep::default();

        if self.current_run_id.is_none() {
            return (Vec::new(), step);
        }

        self.cancelled = true;
        let mut in_flight = Vec::new();

        for (id, run) in self.runs.iter_mut() {
            match run.state {
                TaskState::Running => {
                    in_flight.push(id.clone());
                    run.state = TaskState::Skipped;
                }
                TaskState::Pending => {
                    run.state = TaskState::Skipped;
                }
                _ => {}
            }
        }

        info!(
            run_id = self.current_run_id,
            cancelled_in_flight = in_flight.len(),
            "run cancelled; remaining tasks skipped"
        );

        self.maybe_finish(&mut step);
        (in_flight, step)
    }

    /// Attempts currently dispatched or waiting out a retry delay.
    fn running_count(&self) -> usize {
        self.runs
            .values()
            .filter(|r| r.state == TaskState::Running)
            .count()
    }

    /// Whether `task`'s trigger rule is satisfied by its upstream states.
    fn rule_satisfied(&self, task: &str) -> bool {
        let rule = self
            .graph
            .spec_of(task)
            .map(|s| s.trigger_rule)
            .unwrap_or_default();

        self.graph.dependencies_of(task).iter().all(|dep| {
            let Some(dep_run) = self.runs.get(dep) else {
                warn!(task = %task, dep = %dep, "dependency missing from run table");
                return false;
            };
            match rule {
                TriggerRule::AllSuccess => dep_run.state == TaskState::Succeeded,
                TriggerRule::AllDone => dep_run.state.is_terminal(),
            }
        })
    }

    /// Move ready `Pending` tasks to `Running` up to the concurrency bound
    /// and return their first attempts.
    fn dispatch_ready(&mut self) -> Vec<ScheduledAttempt> {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => return Vec::new(),
        };

        let mut slots = self.max_concurrency.saturating_sub(self.running_count());
        let mut scheduled = Vec::new();

        // Decide first, then mutate, to keep the borrow checker happy.
        let candidates: Vec<TaskId> = self
            .runs
            .iter()
            .filter(|(id, run)| run.state == TaskState::Pending && self.rule_satisfied(id))
            .map(|(id, _)| id.clone())
            .collect();

        for id in candidates {
            if slots == 0 {
                debug!(task = %id, run_id, "ready but concurrency bound reached; staying pending");
                continue;
            }
            let Some(spec) = self.graph.spec_of(&id) else {
                continue;
            };
            let attempt = ScheduledAttempt::new(spec, 1, run_id, self.params.clone());
            let Some(run) = self.runs.get_mut(&id) else {
                continue;
            };
            run.state = TaskState::Running;
            run.attempts = 1;
            debug!(task = %id, run_id, "dependencies satisfied; dispatching first attempt");
            scheduled.push(attempt);
            slots -= 1;
        }

        scheduled
    }

    /// Transitively mark `Pending` dependents of a failed task as
    /// `UpstreamFailed`, honouring each dependent's trigger rule
    /// (`all_done` tasks are left alone; they may still become ready).
    fn mark_dependents_upstream_failed(&mut self, failed_task: &str) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .cloned()
            .collect();
        let mut newly_failed = Vec::new();

        while let Some(id) = stack.pop() {
            let rule = self
                .graph
                .spec_of(&id)
                .map(|s| s.trigger_rule)
                .unwrap_or_default();
            if rule == TriggerRule::AllDone {
                continue;
            }

            if let Some(run) = self.runs.get_mut(&id) {
                if run.state == TaskState::Pending {
                    run.state = TaskState::UpstreamFailed;
                    debug!(task = %id, "marked UpstreamFailed due to upstream failure");
                    newly_failed.push(id.clone());
                    stack.extend(self.graph.dependents_of(&id).iter().cloned());
                }
            }
        }

        newly_failed
    }

    /// If every task is terminal, close the run and attach the report.
    fn maybe_finish(&mut self, step: &mut SchedulerStep) {
        let Some(run_id) = self.current_run_id else {
            return;
        };

        let all_terminal = self.runs.values().all(|r| r.state.is_terminal());
        if !all_terminal {
            return;
        }

        let outcome = if self.cancelled {
            RunOutcome::Cancelled
        } else if self
            .runs
            .values()
            .any(|r| matches!(r.state, TaskState::Failed | TaskState::UpstreamFailed))
        {
            RunOutcome::Failed
        } else {
            RunOutcome::Succeeded
        };

        info!(run_id, ?outcome, "all tasks terminal; run finished");

        step.finished = Some(RunReport {
            run_id,
            workflow: self.workflow.clone(),
            outcome,
            tasks: self.status_table(),
        });
        self.current_run_id = None;
    }

    fn status_table(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.runs
            .iter()
            .map(|(id, run)| {
                (
                    id.clone(),
                    TaskStatus {
                        state: run.state,
                        attempts: run.attempts,
                        last_error: run.last_error.clone(),
                    },
                )
            })
            .collect()
    }
}
