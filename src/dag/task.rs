// src/dag/task.rs

//! Static task metadata: actions, retry policy, trigger rules.

use std::time::Duration;

use crate::config::model::{parse_duration, TaskConfig, WorkflowSection};
use crate::engine::TaskId;

/// The work a task performs, carried as an inert payload.
///
/// The scheduler never interprets an action; only executor adapters
/// pattern-match on the variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Shell command executed via `sh -c`.
    Shell { command: String },
    /// SQL statement handed to the configured runner command.
    Sql { statement: String },
    /// Named callback resolved by an embedding executor.
    Callback { name: String },
}

/// When a task with upstream dependencies becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerRule {
    /// All upstream tasks must have succeeded (default). Any upstream
    /// failure makes this task `UpstreamFailed`.
    #[default]
    AllSuccess,
    /// All upstream tasks must be terminal, whatever their outcome.
    AllDone,
}

/// How failed attempts are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of *retries* after the first attempt; the executor is invoked
    /// at most `limit + 1` times.
    pub limit: u32,
    /// Delay between attempts. The wait is non-blocking for the scheduler.
    pub delay: Duration,
}

/// Static description of a task, derived from config or built directly.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: TaskId,
    pub action: Action,
    pub retry: RetryPolicy,
    /// Optional wall-clock budget per attempt.
    pub timeout: Option<Duration>,
    pub trigger_rule: TriggerRule,
}

impl TaskSpec {
    /// Minimal constructor used by programmatic graph building and tests.
    pub fn new(id: impl Into<TaskId>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            retry: RetryPolicy {
                limit: 0,
                delay: Duration::from_secs(0),
            },
            timeout: None,
            trigger_rule: TriggerRule::AllSuccess,
        }
    }

    pub fn with_retry(mut self, limit: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy { limit, delay };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }

    /// Build a spec from a validated `[task.<id>]` section.
    ///
    /// Duration strings are known-good here (checked in `config::validate`),
    /// so parse failures fall back to the defaults rather than erroring.
    pub fn from_config(id: TaskId, cfg: &TaskConfig, workflow: &WorkflowSection) -> Self {
        let action = if let Some(ref command) = cfg.shell {
            Action::Shell {
                command: command.clone(),
            }
        } else if let Some(ref statement) = cfg.sql {
            Action::Sql {
                statement: statement.clone(),
            }
        } else {
            Action::Callback {
                name: cfg.callback.clone().unwrap_or_default(),
            }
        };

        let delay = cfg
            .retry_delay
            .as_deref()
            .unwrap_or(&workflow.default_retry_delay);
        let delay = parse_duration(delay).unwrap_or(Duration::from_secs(5));

        let timeout = cfg
            .timeout
            .as_deref()
            .and_then(|s| parse_duration(s).ok());

        let trigger_rule = match cfg.trigger_rule.as_deref() {
            Some("all_done") => TriggerRule::AllDone,
            _ => TriggerRule::AllSuccess,
        };

        Self {
            id,
            action,
            retry: RetryPolicy {
                limit: cfg.effective_retries(workflow.default_retries),
                delay,
            },
            timeout,
            trigger_rule,
        }
    }
}
