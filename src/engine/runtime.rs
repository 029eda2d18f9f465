// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::RunReport;
use crate::errors::Result;
use crate::exec::Executor;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the DAG scheduler in response to `RuntimeEvent`s, and delegates
/// actual attempt execution to an [`Executor`].
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching attempts, and arming retry timers.
pub struct Runtime<E: Executor> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    /// Sender side of the same channel, used to feed retry timers back in.
    event_tx: mpsc::Sender<RuntimeEvent>,
    executor: E,
    reports: Vec<RunReport>,
}

impl<E: Executor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            reports: Vec::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (dispatch attempts, arm
    ///   retry timers, cancel, exit).
    ///
    /// Returns the reports of every run that finished, in order.
    pub async fn run(mut self) -> Result<Vec<RunReport>> {
        info!("taskdag runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.reports)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchAttempts(attempts) => {
                if attempts.is_empty() {
                    return Ok(());
                }
                let names: Vec<_> = attempts.iter().map(|a| a.task.as_str()).collect();
                debug!(?names, "dispatching ready attempts");
                self.executor.spawn_attempts(attempts).await?;
            }
            CoreCommand::ScheduleRetry { task, delay } => {
                // Arm a timer that feeds the retry back into the event loop.
                // The task keeps its Running state (and slot) while waiting,
                // so other ready tasks continue to dispatch meanwhile.
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(RuntimeEvent::RetryDue { task }).await;
                });
            }
            CoreCommand::CancelAttempts(tasks) => {
                debug!(?tasks, "cancelling in-flight attempts");
                self.executor.cancel_attempts(tasks).await?;
            }
            CoreCommand::ReportRun(report) => {
                info!(
                    run_id = report.run_id,
                    outcome = ?report.outcome,
                    "run report ready"
                );
                self.reports.push(report);
            }
            CoreCommand::RequestExit => {
                // The core also returns keep_running=false in this case, so
                // this command is informational.
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}
