// src/exec/attempt_runner.rs

//! Individual attempt process runner.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::dag::{Action, ScheduledAttempt};
use crate::engine::{AttemptOutcome, RuntimeEvent};

/// Run a single attempt, emitting `AttemptFinished` on success/failure.
///
/// - Run parameters are exported to the child as environment variables.
/// - An optional wall-clock timeout kills the process and reports the
///   attempt as failed (so it counts against the retry budget).
/// - If the cancel channel fires, the child process is killed and **no**
///   `AttemptFinished` event is sent; the scheduler already marked the task
///   `Skipped` and must not see a completion for it.
pub async fn run_attempt(
    attempt: ScheduledAttempt,
    sql_runner: Option<String>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let task = attempt.task.clone();
    let run_id = attempt.run_id;
    if let Err(err) = run_attempt_inner(attempt, sql_runner, &runtime_tx, cancel_rx).await {
        error!(task = %task, run_id, error = %err, "attempt execution error");
        let _ = runtime_tx
            .send(RuntimeEvent::AttemptFinished {
                task,
                outcome: AttemptOutcome::Failed {
                    error: format!("{err:#}"),
                },
            })
            .await;
    }
}

async fn run_attempt_inner(
    attempt: ScheduledAttempt,
    sql_runner: Option<String>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<()> {
    // Resolve the action into a process invocation plus optional stdin
    // payload. Callback actions have no process realization here.
    let (shell_line, stdin_payload) = match &attempt.action {
        Action::Shell { command } => (command.clone(), None),
        Action::Sql { statement } => match sql_runner {
            Some(runner) => (runner, Some(statement.clone())),
            None => {
                send_outcome(
                    runtime_tx,
                    &attempt.task,
                    AttemptOutcome::Failed {
                        error: "sql action but no [workflow].sql_runner configured".to_string(),
                    },
                )
                .await;
                return Ok(());
            }
        },
        Action::Callback { name } => {
            send_outcome(
                runtime_tx,
                &attempt.task,
                AttemptOutcome::Failed {
                    error: format!(
                        "callback action '{name}' requires an embedding executor"
                    ),
                },
            )
            .await;
            return Ok(());
        }
    };

    info!(
        task = %attempt.task,
        run_id = attempt.run_id,
        attempt = attempt.attempt,
        cmd = %shell_line,
        "starting attempt process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&shell_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&shell_line);
        c
    };

    for (key, value) in attempt.params.iter() {
        cmd.env(key, value);
    }

    cmd.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", attempt.task))?;

    // Consume both pipes so buffers don't fill; log at debug. Must start
    // before the stdin payload is written: a runner that emits output ahead
    // of draining stdin would otherwise fill its stdout pipe and stall.
    spawn_pipe_logger(child.stdout.take(), attempt.task.clone(), "stdout");
    spawn_pipe_logger(child.stderr.take(), attempt.task.clone(), "stderr");

    if let Some(payload) = stdin_payload {
        let mut stdin = child
            .stdin
            .take()
            .context("child stdin not piped despite payload")?;
        let task_id = attempt.task.clone();
        // Feed stdin from its own task so the payload write can proceed
        // concurrently with the child producing output. Dropping the handle
        // closes stdin, letting the runner see end-of-input.
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                warn!(task = %task_id, error = %e, "failed to write stdin payload");
            }
        });
    }

    let timeout = attempt.timeout;
    let timed_out = async move {
        match timeout {
            Some(budget) => tokio::time::sleep(budget).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", attempt.task)
            })?;

            let code = status.code().unwrap_or(-1);
            let outcome = if status.success() {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failed {
                    error: format!("process exited with code {code}"),
                }
            };

            info!(
                task = %attempt.task,
                run_id = attempt.run_id,
                attempt = attempt.attempt,
                exit_code = code,
                success = status.success(),
                "attempt process exited"
            );

            send_outcome(runtime_tx, &attempt.task, outcome).await;
        }

        _ = timed_out => {
            warn!(
                task = %attempt.task,
                run_id = attempt.run_id,
                attempt = attempt.attempt,
                "attempt exceeded its timeout; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(task = %attempt.task, error = %e, "failed to kill timed-out process");
            }
            let budget = timeout.unwrap_or_default();
            send_outcome(
                runtime_tx,
                &attempt.task,
                AttemptOutcome::Failed {
                    error: format!("attempt timed out after {budget:?}"),
                },
            )
            .await;
        }

        cancel = &mut cancel_rx => {
            if cancel.is_ok() {
                info!(
                    task = %attempt.task,
                    run_id = attempt.run_id,
                    "cancellation requested; killing attempt process"
                );
                if let Err(e) = child.kill().await {
                    warn!(task = %attempt.task, error = %e, "failed to kill cancelled process");
                }
            }
            // Cancelled (or cancel sender dropped): no completion event.
        }
    }

    Ok(())
}

async fn send_outcome(
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    task: &str,
    outcome: AttemptOutcome,
) {
    let _ = runtime_tx
        .send(RuntimeEvent::AttemptFinished {
            task: task.to_string(),
            outcome,
        })
        .await;
}

fn spawn_pipe_logger<R>(pipe: Option<R>, task: String, stream: &'static str)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return;
    };
    tokio::spawn(async move {
        let reader = BufReader::new(pipe);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task = %task, "{stream}: {line}");
        }
    });
}
