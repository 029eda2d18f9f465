// tests/scheduler_states.rs
//
// Manual stepping of the scheduler state machine, without the runtime.

use std::time::Duration;

use taskdag::config::ConfigFile;
use taskdag::dag::{RunOutcome, Scheduler, TaskGraph, TaskState};
use taskdag::engine::{run_params, AttemptOutcome, RunParams};
use taskdag_test_utils::builders::{TaskBuilder, WorkflowBuilder};
use taskdag_test_utils::init_tracing;

fn scheduler_for(cfg: &ConfigFile) -> Scheduler {
    let graph = TaskGraph::from_config(cfg);
    Scheduler::new(graph, cfg.workflow.name.clone(), cfg.workflow.max_concurrency)
}

fn failed() -> AttemptOutcome {
    AttemptOutcome::Failed {
        error: "boom".to_string(),
    }
}

#[test]
fn task_runs_only_after_all_upstream_succeeded() {
    init_tracing();

    // a -> c, b -> c
    let cfg = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo a").build())
        .with_task("b", TaskBuilder::shell("echo b").build())
        .with_task("c", TaskBuilder::shell("echo c").after("a").after("b").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    let step = sched.start_run(RunParams::default());
    let first: Vec<_> = step.newly_scheduled.iter().map(|s| s.task.clone()).collect();
    assert_eq!(first, vec!["a", "b"]);
    assert_eq!(sched.state_of("c"), Some(TaskState::Pending));

    // One of two upstreams done: c must stay pending.
    let step = sched.handle_attempt_result("a", AttemptOutcome::Success);
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(sched.state_of("c"), Some(TaskState::Pending));

    let step = sched.handle_attempt_result("b", AttemptOutcome::Success);
    let now: Vec<_> = step.newly_scheduled.iter().map(|s| s.task.clone()).collect();
    assert_eq!(now, vec!["c"]);
    assert_eq!(sched.state_of("c"), Some(TaskState::Running));
}

#[test]
fn concurrency_bound_limits_parallel_dispatch() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_max_concurrency(1)
        .with_task("x", TaskBuilder::shell("echo x").build())
        .with_task("y", TaskBuilder::shell("echo y").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    let step = sched.start_run(RunParams::default());
    assert_eq!(step.newly_scheduled.len(), 1);
    let first = step.newly_scheduled[0].task.clone();

    // The other root is ready but must wait for the slot.
    let other = if first == "x" { "y" } else { "x" };
    assert_eq!(sched.state_of(other), Some(TaskState::Pending));

    let step = sched.handle_attempt_result(&first, AttemptOutcome::Success);
    assert_eq!(step.newly_scheduled.len(), 1);
    assert_eq!(step.newly_scheduled[0].task, other);
}

#[test]
fn retry_flow_counts_attempts_and_keeps_slot() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task(
            "flaky",
            TaskBuilder::shell("exit 1")
                .retries(2)
                .retry_delay("250ms")
                .build(),
        )
        .with_task("down", TaskBuilder::shell("echo down").after("flaky").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    let step = sched.start_run(RunParams::default());
    assert_eq!(step.newly_scheduled[0].attempt, 1);

    // First failure: retry scheduled, task stays Running.
    let step = sched.handle_attempt_result("flaky", failed());
    assert_eq!(step.retries, vec![("flaky".to_string(), Duration::from_millis(250))]);
    assert_eq!(sched.state_of("flaky"), Some(TaskState::Running));
    assert!(step.finished.is_none());

    let step = sched.handle_retry_due("flaky");
    assert_eq!(step.newly_scheduled[0].attempt, 2);

    let step = sched.handle_attempt_result("flaky", failed());
    assert_eq!(step.retries.len(), 1);

    let step = sched.handle_retry_due("flaky");
    assert_eq!(step.newly_scheduled[0].attempt, 3);

    // Third failure exhausts the budget: permanent failure, dependents fail,
    // run finishes.
    let step = sched.handle_attempt_result("flaky", failed());
    assert!(step.retries.is_empty());
    assert_eq!(step.newly_upstream_failed, vec!["down".to_string()]);

    let report = step.finished.expect("run finished");
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.task("flaky").unwrap().attempts, 3);
    assert_eq!(report.task("flaky").unwrap().state, TaskState::Failed);
    assert_eq!(report.task("down").unwrap().state, TaskState::UpstreamFailed);
}

#[test]
fn all_done_task_runs_despite_upstream_failure() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("exit 1").build())
        .with_task(
            "cleanup",
            TaskBuilder::shell("echo cleanup")
                .after("a")
                .trigger_rule("all_done")
                .build(),
        )
        .build();
    let mut sched = scheduler_for(&cfg);

    sched.start_run(RunParams::default());

    let step = sched.handle_attempt_result("a", failed());
    assert!(step.newly_upstream_failed.is_empty());
    let now: Vec<_> = step.newly_scheduled.iter().map(|s| s.task.clone()).collect();
    assert_eq!(now, vec!["cleanup"]);

    let step = sched.handle_attempt_result("cleanup", AttemptOutcome::Success);
    let report = step.finished.expect("run finished");
    // The run still fails because `a` failed, but cleanup ran.
    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.task("cleanup").unwrap().state, TaskState::Succeeded);
}

#[test]
fn cancel_skips_all_non_terminal_tasks() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("sleep 60").build())
        .with_task("b", TaskBuilder::shell("echo b").after("a").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    sched.start_run(RunParams::default());
    assert_eq!(sched.state_of("a"), Some(TaskState::Running));

    let (in_flight, step) = sched.cancel_run();
    assert_eq!(in_flight, vec!["a".to_string()]);

    let report = step.finished.expect("cancel finishes the run");
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.task("a").unwrap().state, TaskState::Skipped);
    assert_eq!(report.task("b").unwrap().state, TaskState::Skipped);

    // A late completion from the cancelled attempt is ignored.
    let step = sched.handle_attempt_result("a", AttemptOutcome::Success);
    assert!(step.newly_scheduled.is_empty());
    assert!(step.finished.is_none());
}

#[test]
fn status_snapshots_states_and_attempts_through_a_run() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task(
            "a",
            TaskBuilder::shell("echo a").retries(1).retry_delay("10ms").build(),
        )
        .with_task("b", TaskBuilder::shell("echo b").after("a").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    // No run yet: nothing to report.
    assert!(sched.status().is_none());

    sched.start_run(RunParams::default());
    let status = sched.status().expect("active run has a status");
    assert_eq!(status.run_id, 1);
    assert!(!status.is_finished());
    assert_eq!(status.tasks["a"].state, TaskState::Running);
    assert_eq!(status.tasks["a"].attempts, 1);
    assert_eq!(status.tasks["b"].state, TaskState::Pending);
    assert_eq!(status.tasks["b"].attempts, 0);

    // A retried task shows up as still Running with a bumped attempt count.
    sched.handle_attempt_result("a", failed());
    sched.handle_retry_due("a");
    let status = sched.status().expect("status during retry");
    assert!(!status.is_finished());
    assert_eq!(status.tasks["a"].state, TaskState::Running);
    assert_eq!(status.tasks["a"].attempts, 2);

    sched.handle_attempt_result("a", AttemptOutcome::Success);
    sched.handle_attempt_result("b", AttemptOutcome::Success);
    let status = sched.status().expect("status after the run finished");
    assert!(status.is_finished());
    assert_eq!(status.tasks["a"].state, TaskState::Succeeded);
    assert_eq!(status.tasks["b"].state, TaskState::Succeeded);
}

#[test]
fn run_params_flow_into_every_attempt() {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task("a", TaskBuilder::shell("echo $RATE").build())
        .build();
    let mut sched = scheduler_for(&cfg);

    let step = sched.start_run(run_params([("RATE", "0.85")]));
    let attempt = &step.newly_scheduled[0];
    assert_eq!(attempt.params.get("RATE").map(String::as_str), Some("0.85"));
}
