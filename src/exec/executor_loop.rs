// src/exec/executor_loop.rs

//! Background loop that manages running attempt processes.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::dag::ScheduledAttempt;
use crate::engine::{RuntimeEvent, TaskId};

use super::attempt_runner::run_attempt;

/// Messages accepted by the executor loop.
#[derive(Debug)]
pub enum ExecutorMsg {
    /// Execute one attempt.
    Run(ScheduledAttempt),
    /// Cooperatively stop the in-flight attempts of these tasks. Stopped
    /// attempts emit no `AttemptFinished` event.
    Cancel(Vec<TaskId>),
}

/// Internal handle for a currently-running attempt process.
struct ActiveAttempt {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// The returned sender is what [`super::ProcessExecutor`] forwards to. Each
/// attempt runs in its own Tokio task; the scheduler guarantees at most one
/// in-flight attempt per task id, so the active map is keyed by task.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    sql_runner: Option<String>,
) -> mpsc::Sender<ExecutorMsg> {
    let (tx, mut rx) = mpsc::channel::<ExecutorMsg>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<TaskId, ActiveAttempt> = HashMap::new();

        while let Some(msg) = rx.recv().await {
            match msg {
                ExecutorMsg::Run(attempt) => {
                    start_attempt(attempt, &sql_runner, &mut active, &runtime_tx);
                }
                ExecutorMsg::Cancel(tasks) => {
                    cancel_attempts(tasks, &mut active);
                }
            }

            active.retain(|_, a| !a.handle.is_finished());
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

fn start_attempt(
    attempt: ScheduledAttempt,
    sql_runner: &Option<String>,
    active: &mut HashMap<TaskId, ActiveAttempt>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let task = attempt.task.clone();
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let runner = sql_runner.clone();

    let spawn_task = task.clone();
    let handle = tokio::spawn(async move {
        run_attempt(attempt, runner, rt_tx, cancel_rx).await;
        debug!(task = %spawn_task, "attempt runner future finished");
    });

    active.insert(
        task,
        ActiveAttempt {
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_attempts(tasks: Vec<TaskId>, active: &mut HashMap<TaskId, ActiveAttempt>) {
    for task in tasks {
        let Some(existing) = active.get_mut(&task) else {
            continue;
        };

        if let Some(cancel) = existing.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(task = %task, "attempt already finished while cancelling");
            } else {
                info!(task = %task, "cancellation signalled to in-flight attempt");
            }
        }
    }
}
