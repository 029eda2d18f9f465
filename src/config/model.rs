// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level workflow definition as read from a TOML file.
///
/// ```toml
/// [workflow]
/// name = "etl_demo"
/// max_concurrency = 4
/// default_retries = 1
/// default_retry_delay = "5s"
///
/// [task.extract]
/// shell = "generate-records | publish-topic raw"
/// after = ["prepare"]
/// retries = 2
/// ```
///
/// The `[workflow]` section is optional; every field has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[workflow]`.
    #[serde(default)]
    pub workflow: WorkflowSection,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A [`RawConfigFile`] that has passed semantic validation.
///
/// Constructed only via `TryFrom<RawConfigFile>` (see `config::validate`), so
/// holding one of these means: at least one task, all `after` references
/// resolve, no self-dependencies, no cycles, exactly one action per task, and
/// all duration strings parse.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub workflow: WorkflowSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Internal constructor used by validation. Not public API.
    pub(crate) fn new_unchecked(
        workflow: WorkflowSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { workflow, task }
    }
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    /// Workflow name, used only for logging and the run report header.
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Maximum number of attempts executing at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Default retry limit for tasks that do not set `retries`.
    #[serde(default)]
    pub default_retries: u32,

    /// Default delay between attempts for tasks that do not set
    /// `retry_delay`. Duration string, e.g. `"5s"`, `"2m"`, `"500ms"`.
    #[serde(default = "default_retry_delay")]
    pub default_retry_delay: String,

    /// Command that `sql = "..."` actions are piped into, e.g.
    /// `"psql -q -f -"`. If unset, sql actions fail at execution time.
    #[serde(default)]
    pub sql_runner: Option<String>,
}

fn default_workflow_name() -> String {
    "workflow".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            max_concurrency: default_max_concurrency(),
            default_retries: 0,
            default_retry_delay: default_retry_delay(),
            sql_runner: None,
        }
    }
}

/// `[task.<id>]` section.
///
/// Exactly one of `shell`, `sql`, `callback` must be set; this is enforced by
/// validation, not by serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Shell command to execute via `sh -c`.
    #[serde(default)]
    pub shell: Option<String>,

    /// SQL statement, handed to the configured `workflow.sql_runner`.
    #[serde(default)]
    pub sql: Option<String>,

    /// Named callback, resolvable only by an embedding executor.
    #[serde(default)]
    pub callback: Option<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Retry limit for this task; falls back to `workflow.default_retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Delay between attempts; falls back to `workflow.default_retry_delay`.
    #[serde(default)]
    pub retry_delay: Option<String>,

    /// Optional wall-clock budget per attempt; expiry counts as a failure.
    #[serde(default)]
    pub timeout: Option<String>,

    /// `"all_success"` (default) or `"all_done"`.
    #[serde(default)]
    pub trigger_rule: Option<String>,
}

impl TaskConfig {
    /// Effective retry limit given the workflow default.
    pub fn effective_retries(&self, default_retries: u32) -> u32 {
        self.retries.unwrap_or(default_retries)
    }
}

/// Parse a duration string like `"500ms"`, `"5s"`, `"2m"`, `"1h"`.
///
/// A bare integer is interpreted as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{s}': expected a number"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!(
            "invalid duration '{s}': unknown unit '{other}' (expected ms, s, m or h)"
        )),
    }
}
