#![allow(dead_code)]

use std::collections::BTreeMap;

use taskdag::config::{ConfigFile, RawConfigFile, TaskConfig, WorkflowSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct WorkflowBuilder {
    config: RawConfigFile,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                workflow: WorkflowSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, id: &str, task: TaskConfig) -> Self {
        self.config.task.insert(id.to_string(), task);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.config.workflow.name = name.to_string();
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.config.workflow.max_concurrency = n;
        self
    }

    pub fn with_default_retries(mut self, n: u32) -> Self {
        self.config.workflow.default_retries = n;
        self
    }

    pub fn with_default_retry_delay(mut self, delay: &str) -> Self {
        self.config.workflow.default_retry_delay = delay.to_string();
        self
    }

    pub fn with_sql_runner(mut self, cmd: &str) -> Self {
        self.config.workflow.sql_runner = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Access the raw config, for tests that exercise validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskBuilder {
    task: TaskConfig,
}

impl TaskBuilder {
    /// A task with a shell action.
    pub fn shell(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                shell: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A task with a SQL action.
    pub fn sql(statement: &str) -> Self {
        Self {
            task: TaskConfig {
                sql: Some(statement.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A task with a callback action.
    pub fn callback(name: &str) -> Self {
        Self {
            task: TaskConfig {
                callback: Some(name.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.task.retries = Some(n);
        self
    }

    pub fn retry_delay(mut self, delay: &str) -> Self {
        self.task.retry_delay = Some(delay.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.task.timeout = Some(timeout.to_string());
        self
    }

    pub fn trigger_rule(mut self, rule: &str) -> Self {
        self.task.trigger_rule = Some(rule.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
