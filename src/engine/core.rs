// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending attempts to the executor and arming retry timers
//! - handling Ctrl-C / cancellation
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or processes.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_attempt_finished, handle_cancel, handle_retry_due, handle_run_trigger, CoreStep,
};
use crate::engine::queue::RunQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Pure core runtime state.
///
/// This owns:
/// - the DAG scheduler
/// - the run queue
/// - runtime options (e.g. `exit_when_idle`)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: RunQueue,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, max_queued_runs: usize, options: RuntimeOptions) -> Self {
        let queue = RunQueue::new(max_queued_runs);
        Self {
            scheduler,
            queue,
            options,
        }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Expose queue emptiness (for tests).
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Read access to the scheduler, e.g. for status queries.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::RunTriggered { params } => {
                handle_run_trigger(&mut self.scheduler, &mut self.queue, &self.options, params)
            }
            RuntimeEvent::AttemptFinished { task, outcome } => handle_attempt_finished(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::RetryDue { task } => {
                handle_retry_due(&mut self.scheduler, &mut self.queue, &self.options, task)
            }
            RuntimeEvent::CancelRequested => {
                handle_cancel(&mut self.scheduler, &mut self.queue, &self.options)
            }
        }
    }
}
