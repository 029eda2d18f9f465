// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The runtime talks to an [`Executor`] instead of a raw mpsc sender. This
//! is the boundary through which all real work (subprocess invocation, SQL
//! execution, anything else an action means) is delegated:
//!
//! - `ProcessExecutor` is the default implementation used by the `taskdag`
//!   binary. It wraps the executor loop in [`executor_loop`] and forwards
//!   scheduled attempts over an mpsc channel.
//! - Tests (and embedders) provide their own `Executor` that, for example,
//!   records which attempts were dispatched and directly emits
//!   `AttemptFinished` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledAttempt;
use crate::engine::{RuntimeEvent, TaskId};
use crate::errors::{Error, Result};

use super::executor_loop::{spawn_executor, ExecutorMsg};

/// Trait abstracting how scheduled attempts are executed.
///
/// The scheduler invokes `spawn_attempts` once per attempt and expects an
/// `AttemptFinished` event back for each, except for attempts cancelled via
/// `cancel_attempts`. Idempotence of external side effects under retry is
/// the action's own concern, not the executor's.
pub trait Executor: Send {
    /// Dispatch the given attempts for execution.
    fn spawn_attempts(
        &mut self,
        attempts: Vec<ScheduledAttempt>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Best-effort cooperative stop of in-flight attempts. No
    /// `AttemptFinished` event is expected for a cancelled attempt.
    fn cancel_attempts(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Process-spawning executor used by the binary.
///
/// Internally this wraps the background loop from [`spawn_executor`]; the
/// runtime calls `spawn_attempts`, which forwards over an mpsc channel.
pub struct ProcessExecutor {
    tx: mpsc::Sender<ExecutorMsg>,
}

impl ProcessExecutor {
    /// Create a new process executor, wiring it to the given runtime event
    /// sender. `sql_runner` is the command that `Sql` actions are piped into.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, sql_runner: Option<String>) -> Self {
        let tx = spawn_executor(runtime_tx, sql_runner);
        Self { tx }
    }
}

impl Executor for ProcessExecutor {
    fn spawn_attempts(
        &mut self,
        attempts: Vec<ScheduledAttempt>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for attempt in attempts {
                tx.send(ExecutorMsg::Run(attempt))
                    .await
                    .map_err(|e| Error::msg(e.to_string()))?;
            }
            Ok(())
        })
    }

    fn cancel_attempts(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            tx.send(ExecutorMsg::Cancel(tasks))
                .await
                .map_err(|e| Error::msg(e.to_string()))?;
            Ok(())
        })
    }
}
