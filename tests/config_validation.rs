// tests/config_validation.rs
//
// Construction-time errors: a workflow definition that fails validation
// produces no usable graph at all.

use std::io::Write;

use taskdag::config::{load_and_validate, ConfigFile};
use taskdag::errors::TaskdagError;
use taskdag_test_utils::builders::{TaskBuilder, WorkflowBuilder};

#[test]
fn empty_workflow_rejected() {
    let raw = WorkflowBuilder::new().build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskdagError::ConfigError(_)));
}

#[test]
fn unknown_dependency_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo a").after("ghost").build())
        .build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskdagError::ConfigError(_)));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn self_dependency_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo a").after("a").build())
        .build_raw();
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn dependency_cycle_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo a").after("c").build())
        .with_task("b", TaskBuilder::shell("echo b").after("a").build())
        .with_task("c", TaskBuilder::shell("echo c").after("b").build())
        .build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, TaskdagError::DagCycle(_)));
}

#[test]
fn task_without_action_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task("a", taskdag::config::TaskConfig::default())
        .build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("no action"));
}

#[test]
fn task_with_two_actions_rejected() {
    let mut task = TaskBuilder::shell("echo a").build();
    task.sql = Some("SELECT 1".to_string());
    let raw = WorkflowBuilder::new().with_task("a", task).build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("multiple actions"));
}

#[test]
fn bad_retry_delay_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo a").retry_delay("soon").build())
        .build_raw();
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn unknown_trigger_rule_rejected() {
    let raw = WorkflowBuilder::new()
        .with_task(
            "a",
            TaskBuilder::shell("echo a").trigger_rule("one_success").build(),
        )
        .build_raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("one_success"));
}

#[test]
fn zero_max_concurrency_rejected() {
    let raw = WorkflowBuilder::new()
        .with_max_concurrency(0)
        .with_task("a", TaskBuilder::shell("echo a").build())
        .build_raw();
    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn loads_a_valid_workflow_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[workflow]
name = "etl_demo"
max_concurrency = 2
default_retries = 1

[task.prepare]
shell = "echo preparing"

[task.load]
sql = "INSERT INTO dwh.fact VALUES (1)"
after = ["prepare"]
retries = 2
retry_delay = "30s"
timeout = "10m"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.workflow.name, "etl_demo");
    assert_eq!(cfg.task.len(), 2);
    assert_eq!(cfg.task["load"].after, vec!["prepare".to_string()]);
    assert_eq!(cfg.task["load"].effective_retries(cfg.workflow.default_retries), 2);
    assert_eq!(
        cfg.task["prepare"].effective_retries(cfg.workflow.default_retries),
        1
    );
}

#[test]
fn malformed_toml_surfaces_a_toml_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[task.a\nshell = ").unwrap();

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, TaskdagError::TomlError(_)));
}
