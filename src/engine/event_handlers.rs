// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use crate::dag::{RunReport, ScheduledAttempt, Scheduler, SchedulerStep};
use crate::engine::queue::RunQueue;
use crate::engine::{AttemptOutcome, RunParams, RuntimeOptions, TaskId};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these attempts to the executor.
    DispatchAttempts(Vec<ScheduledAttempt>),
    /// Arm a timer; when it fires, feed back `RetryDue { task }`.
    ScheduleRetry { task: TaskId, delay: Duration },
    /// Ask the executor to stop these in-flight attempts (best effort).
    CancelAttempts(Vec<TaskId>),
    /// A run finished; surface its report.
    ReportRun(RunReport),
    /// Request that the process exits (single-shot mode when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn keep_running() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

/// Handle a run trigger.
///
/// - Idle scheduler: start the run immediately.
/// - Active run: remember the trigger for later; the queued run starts when
///   the current one finishes.
pub fn handle_run_trigger(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    params: RunParams,
) -> CoreStep {
    let mut step = CoreStep::keep_running();

    if scheduler.is_idle() {
        let sched_step = scheduler.start_run(params);
        push_scheduler_commands(&mut step.commands, sched_step);
        finish_or_exit(scheduler, queue, options, &mut step);
    } else {
        queue.record_trigger(params);
    }

    step
}

/// Handle a finished executor attempt.
pub fn handle_attempt_finished(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    task: TaskId,
    outcome: AttemptOutcome,
) -> CoreStep {
    let mut step = CoreStep::keep_running();

    let sched_step = scheduler.handle_attempt_result(&task, outcome);
    push_scheduler_commands(&mut step.commands, sched_step);
    finish_or_exit(scheduler, queue, options, &mut step);

    step
}

/// Handle an elapsed retry delay.
pub fn handle_retry_due(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    task: TaskId,
) -> CoreStep {
    let mut step = CoreStep::keep_running();

    let sched_step = scheduler.handle_retry_due(&task);
    push_scheduler_commands(&mut step.commands, sched_step);
    finish_or_exit(scheduler, queue, options, &mut step);

    step
}

/// Handle a cancellation request.
///
/// Cancels the active run, drops queued triggers and, in single-shot mode,
/// requests exit.
pub fn handle_cancel(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
) -> CoreStep {
    let mut step = CoreStep::keep_running();

    queue.clear();

    let (in_flight, sched_step) = scheduler.cancel_run();
    if !in_flight.is_empty() {
        step.commands.push(CoreCommand::CancelAttempts(in_flight));
    }
    push_scheduler_commands(&mut step.commands, sched_step);

    if options.exit_when_idle {
        step.commands.push(CoreCommand::RequestExit);
        step.keep_running = false;
    }

    step
}

/// Translate a [`SchedulerStep`] into core commands.
fn push_scheduler_commands(commands: &mut Vec<CoreCommand>, step: SchedulerStep) {
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchAttempts(step.newly_scheduled));
    }
    for (task, delay) in step.retries {
        commands.push(CoreCommand::ScheduleRetry { task, delay });
    }
    if let Some(report) = step.finished {
        commands.push(CoreCommand::ReportRun(report));
    }
}

/// After any event: start the next queued run if the scheduler went idle,
/// or request exit in single-shot mode when nothing is left to do.
fn finish_or_exit(
    scheduler: &mut Scheduler,
    queue: &mut RunQueue,
    options: &RuntimeOptions,
    step: &mut CoreStep,
) {
    while scheduler.is_idle() {
        let Some(params) = queue.pop_next() else {
            break;
        };
        let sched_step = scheduler.start_run(params);
        push_scheduler_commands(&mut step.commands, sched_step);
    }

    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        step.commands.push(CoreCommand::RequestExit);
        step.keep_running = false;
    }
}
