// tests/runtime_fake_executor.rs
//
// Runtime event-loop behaviour with a fake executor: simple chains and
// trigger queueing.

use std::error::Error;

use tokio::sync::mpsc;

use taskdag::config::ConfigFile;
use taskdag::dag::{RunOutcome, Scheduler, TaskGraph};
use taskdag::engine::{CoreRuntime, RunParams, Runtime, RuntimeEvent, RuntimeOptions};
use taskdag_test_utils::builders::{TaskBuilder, WorkflowBuilder};
use taskdag_test_utils::fake_executor::{FakeExecutor, OutcomeScript};
use taskdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Very simple chain: A -> B
fn simple_chain_config() -> ConfigFile {
    WorkflowBuilder::new()
        .with_task("A", TaskBuilder::shell("echo A").build())
        .with_task("B", TaskBuilder::shell("echo B").after("A").build())
        .build()
}

#[tokio::test]
async fn runtime_runs_simple_chain_in_order() -> TestResult {
    init_tracing();

    let cfg = simple_chain_config();
    let graph = TaskGraph::from_config(&cfg);
    let scheduler = Scheduler::new(graph, "chain", cfg.workflow.max_concurrency);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let (executor, handles) = FakeExecutor::new(rt_tx.clone(), OutcomeScript::new());

    rt_tx
        .send(RuntimeEvent::RunTriggered {
            params: RunParams::default(),
        })
        .await?;

    let core = CoreRuntime::new(
        scheduler,
        1,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    let runtime = Runtime::new(core, rt_rx, rt_tx, executor);
    let reports = with_timeout(runtime.run()).await?;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, RunOutcome::Succeeded);
    assert_eq!(handles.executed_tasks(), vec!["A", "B"]);
    Ok(())
}

#[tokio::test]
async fn trigger_during_active_run_queues_a_second_run() -> TestResult {
    init_tracing();

    let cfg = simple_chain_config();
    let graph = TaskGraph::from_config(&cfg);
    let scheduler = Scheduler::new(graph, "chain", cfg.workflow.max_concurrency);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let (executor, handles) = FakeExecutor::new(rt_tx.clone(), OutcomeScript::new());

    // Two triggers before the loop starts: the second arrives while the
    // first run is still active and must be queued, not dropped.
    for _ in 0..2 {
        rt_tx
            .send(RuntimeEvent::RunTriggered {
                params: RunParams::default(),
            })
            .await?;
    }

    let core = CoreRuntime::new(
        scheduler,
        1,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    let runtime = Runtime::new(core, rt_rx, rt_tx, executor);
    let reports = with_timeout(runtime.run()).await?;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].run_id, 1);
    assert_eq!(reports[1].run_id, 2);
    assert!(reports.iter().all(|r| r.outcome == RunOutcome::Succeeded));
    assert_eq!(handles.executed_tasks(), vec!["A", "B", "A", "B"]);
    Ok(())
}
