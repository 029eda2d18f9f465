use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use taskdag::dag::ScheduledAttempt;
use taskdag::engine::{AttemptOutcome, RuntimeEvent, TaskId};
use taskdag::errors::Result;
use taskdag::exec::Executor;

/// Shared script driving a [`FakeExecutor`]: per-task queues of outcomes.
///
/// Each dispatched attempt for a task pops the next scripted outcome; when a
/// task's queue is exhausted (or absent) the attempt succeeds. This makes
/// "fail twice then succeed" scenarios one-liners.
#[derive(Debug, Default)]
pub struct OutcomeScript {
    outcomes: HashMap<TaskId, VecDeque<AttemptOutcome>>,
    hanging: HashSet<TaskId>,
}

impl OutcomeScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `n` failures for `task` before it starts succeeding.
    pub fn fail_times(mut self, task: &str, n: usize) -> Self {
        let queue = self.outcomes.entry(task.to_string()).or_default();
        for _ in 0..n {
            queue.push_back(AttemptOutcome::Failed {
                error: "scripted failure".to_string(),
            });
        }
        self
    }

    /// Make every attempt of `task` fail.
    pub fn always_fail(self, task: &str) -> Self {
        // More failures than any sane retry limit in a test.
        self.fail_times(task, 1000)
    }

    /// Make `task`'s attempts hang: they are recorded but never complete.
    /// Used by cancellation tests.
    pub fn hang(mut self, task: &str) -> Self {
        self.hanging.insert(task.to_string());
        self
    }

    /// `None` means the attempt hangs and no completion event is emitted.
    fn next_outcome(&mut self, task: &str) -> Option<AttemptOutcome> {
        if self.hanging.contains(task) {
            return None;
        }
        Some(
            self.outcomes
                .get_mut(task)
                .and_then(|q| q.pop_front())
                .unwrap_or(AttemptOutcome::Success),
        )
    }
}

/// A fake executor that:
/// - records every dispatched attempt (task id and attempt number)
/// - immediately reports the next scripted outcome for each attempt
/// - records cancellations instead of doing anything with them.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    script: Arc<Mutex<OutcomeScript>>,
    executed: Arc<Mutex<Vec<(TaskId, u32)>>>,
    cancelled: Arc<Mutex<Vec<TaskId>>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        script: OutcomeScript,
    ) -> (Self, FakeExecutorHandles) {
        let script = Arc::new(Mutex::new(script));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let cancelled = Arc::new(Mutex::new(Vec::new()));

        let handles = FakeExecutorHandles {
            executed: Arc::clone(&executed),
            cancelled: Arc::clone(&cancelled),
        };

        (
            Self {
                runtime_tx,
                script,
                executed,
                cancelled,
            },
            handles,
        )
    }
}

/// Shared views into what a [`FakeExecutor`] saw, for assertions.
#[derive(Clone)]
pub struct FakeExecutorHandles {
    pub executed: Arc<Mutex<Vec<(TaskId, u32)>>>,
    pub cancelled: Arc<Mutex<Vec<TaskId>>>,
}

impl FakeExecutorHandles {
    /// Task ids of every dispatched attempt, in dispatch order.
    pub fn executed_tasks(&self) -> Vec<TaskId> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Number of attempts dispatched for one task.
    pub fn attempts_of(&self, task: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == task)
            .count()
    }
}

impl Executor for FakeExecutor {
    fn spawn_attempts(
        &mut self,
        attempts: Vec<ScheduledAttempt>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let script = Arc::clone(&self.script);
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for attempt in attempts {
                let outcome = {
                    let mut guard = script.lock().unwrap();
                    executed
                        .lock()
                        .unwrap()
                        .push((attempt.task.clone(), attempt.attempt));
                    guard.next_outcome(&attempt.task)
                };

                let Some(outcome) = outcome else {
                    continue;
                };

                tx.send(RuntimeEvent::AttemptFinished {
                    task: attempt.task.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn cancel_attempts(
        &mut self,
        tasks: Vec<TaskId>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let cancelled = Arc::clone(&self.cancelled);

        Box::pin(async move {
            cancelled.lock().unwrap().extend(tasks);
            Ok(())
        })
    }
}
