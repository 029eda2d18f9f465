// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{RunOutcome, RunReport, Scheduler, TaskGraph};
use crate::engine::{run_params, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::ProcessExecutor;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workflow loading and validation
/// - graph / scheduler / runtime
/// - the process executor
/// - Ctrl-C handling (cancels the run)
///
/// Runs the workflow once and returns the finished run reports.
pub async fn run(args: CliArgs) -> Result<Vec<RunReport>> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(Vec::new());
    }

    let graph = TaskGraph::from_config(&cfg);
    let scheduler = Scheduler::new(graph, cfg.workflow.name.clone(), cfg.workflow.max_concurrency);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Process executor (real implementation in production).
    let executor = ProcessExecutor::new(rt_tx.clone(), cfg.workflow.sql_runner.clone());

    // Ctrl-C → cancel the active run and skip what hasn't started.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::CancelRequested).await;
        });
    }

    // Single trigger: one run per invocation. The trigger arrives as an
    // event so that embedders can inject their own trigger source instead.
    let params = run_params(args.param_pairs()?);
    info!(workflow = %cfg.workflow.name, "triggering run");
    rt_tx.send(RuntimeEvent::RunTriggered { params }).await?;

    let options = RuntimeOptions {
        exit_when_idle: true,
    };

    // Pure core (single source of truth for semantics) + async IO shell.
    let core = CoreRuntime::new(scheduler, 1, options);
    let runtime = Runtime::new(core, rt_rx, rt_tx, executor);

    let reports = runtime.run().await?;
    for rep in &reports {
        print!("{}", report::render(rep));
    }
    Ok(reports)
}

/// Whether every finished run succeeded (used for the process exit code).
pub fn all_succeeded(reports: &[RunReport]) -> bool {
    reports
        .iter()
        .all(|r| r.outcome == RunOutcome::Succeeded)
}

/// Simple dry-run output: print tasks, dependencies and dependency batches.
fn print_dry_run(cfg: &ConfigFile) {
    let graph = TaskGraph::from_config(cfg);

    println!("taskdag dry-run: workflow '{}'", cfg.workflow.name);
    println!("  max_concurrency = {}", cfg.workflow.max_concurrency);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for id in graph.tasks() {
        let Some(spec) = graph.spec_of(id) else {
            continue;
        };
        println!("  - {id}");
        match &spec.action {
            dag::Action::Shell { command } => println!("      shell: {command}"),
            dag::Action::Sql { statement } => println!("      sql: {statement}"),
            dag::Action::Callback { name } => println!("      callback: {name}"),
        }
        let deps = graph.dependencies_of(id);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if spec.retry.limit > 0 {
            println!(
                "      retries: {} (delay {:?})",
                spec.retry.limit, spec.retry.delay
            );
        }
        if let Some(timeout) = spec.timeout {
            println!("      timeout: {timeout:?}");
        }
    }

    println!();
    println!("dependency batches:");
    for (i, batch) in graph.topological_batches().enumerate() {
        println!("  {i}: {batch:?}");
    }
}
