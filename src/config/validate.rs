// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{parse_duration, ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{Result, TaskdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.workflow, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_workflow_section(cfg)?;
    validate_task_actions(cfg)?;
    validate_task_durations(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskdagError::ConfigError(
            "config must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.workflow.max_concurrency == 0 {
        return Err(TaskdagError::ConfigError(
            "[workflow].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    parse_duration(&cfg.workflow.default_retry_delay).map_err(|e| {
        TaskdagError::ConfigError(format!("[workflow].default_retry_delay: {e}"))
    })?;

    Ok(())
}

/// Every task must declare exactly one action.
fn validate_task_actions(cfg: &RawConfigFile) -> Result<()> {
    for (id, task) in cfg.task.iter() {
        let count = action_field_count(task);
        if count == 0 {
            return Err(TaskdagError::ConfigError(format!(
                "task '{id}' has no action: set exactly one of `shell`, `sql`, `callback`"
            )));
        }
        if count > 1 {
            return Err(TaskdagError::ConfigError(format!(
                "task '{id}' has multiple actions: set exactly one of `shell`, `sql`, `callback`"
            )));
        }
    }
    Ok(())
}

fn action_field_count(task: &TaskConfig) -> usize {
    [
        task.shell.is_some(),
        task.sql.is_some(),
        task.callback.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count()
}

fn validate_task_durations(cfg: &RawConfigFile) -> Result<()> {
    for (id, task) in cfg.task.iter() {
        if let Some(ref delay) = task.retry_delay {
            parse_duration(delay).map_err(|e| {
                TaskdagError::ConfigError(format!("task '{id}' retry_delay: {e}"))
            })?;
        }
        if let Some(ref timeout) = task.timeout {
            parse_duration(timeout).map_err(|e| {
                TaskdagError::ConfigError(format!("task '{id}' timeout: {e}"))
            })?;
        }
        if let Some(ref rule) = task.trigger_rule {
            match rule.as_str() {
                "all_success" | "all_done" => {}
                other => {
                    return Err(TaskdagError::ConfigError(format!(
                        "task '{id}' trigger_rule: unknown rule '{other}' \
                         (expected \"all_success\" or \"all_done\")"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (id, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(TaskdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    id, dep
                )));
            }
            if dep == id {
                return Err(TaskdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    id
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Build a petgraph graph from the tasks and their dependencies.
    //
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in cfg.task.keys() {
        graph.add_node(id.as_str());
    }

    for (id, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(TaskdagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}
