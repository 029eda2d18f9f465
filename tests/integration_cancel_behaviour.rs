// tests/integration_cancel_behaviour.rs
//
// Cancellation through the runtime: in-flight attempts are signalled,
// untouched tasks are skipped, and the run reports `Cancelled`.

use std::error::Error;

use tokio::sync::mpsc;

use taskdag::dag::{RunOutcome, Scheduler, TaskGraph, TaskState};
use taskdag::engine::{CoreRuntime, RunParams, Runtime, RuntimeEvent, RuntimeOptions};
use taskdag_test_utils::builders::{TaskBuilder, WorkflowBuilder};
use taskdag_test_utils::fake_executor::{FakeExecutor, OutcomeScript};
use taskdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancel_skips_pending_tasks_and_signals_in_flight_attempts() -> TestResult {
    init_tracing();

    let cfg = WorkflowBuilder::new()
        .with_task("slow", TaskBuilder::shell("sleep 60").build())
        .with_task("after", TaskBuilder::shell("echo after").after("slow").build())
        .build();
    let graph = TaskGraph::from_config(&cfg);
    let scheduler = Scheduler::new(graph, "cancel", cfg.workflow.max_concurrency);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    // `slow` hangs: its attempt is dispatched but never completes.
    let script = OutcomeScript::new().hang("slow");
    let (executor, handles) = FakeExecutor::new(rt_tx.clone(), script);

    rt_tx
        .send(RuntimeEvent::RunTriggered {
            params: RunParams::default(),
        })
        .await?;
    rt_tx.send(RuntimeEvent::CancelRequested).await?;

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
    let report = &reports[0];
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.task("slow").unwrap().state, TaskState::Skipped);
    assert_eq!(report.task("after").unwrap().state, TaskState::Skipped);

    // The in-flight attempt was asked to stop; the pending one never started.
    assert_eq!(handles.cancelled.lock().unwrap().as_slice(), ["slow"]);
    assert_eq!(handles.executed_tasks(), vec!["slow"]);
    Ok(())
}
