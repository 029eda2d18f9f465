// src/report.rs

//! Plain-text rendering of run reports.

use std::fmt::Write as _;

use crate::dag::{RunOutcome, RunReport, TaskState};

/// Render a finished run as a small text table: one line per task with its
/// terminal state, attempt count and, for failed tasks, the last error.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();

    let outcome = match report.outcome {
        RunOutcome::Succeeded => "succeeded",
        RunOutcome::Failed => "failed",
        RunOutcome::Cancelled => "cancelled",
    };
    let _ = writeln!(
        out,
        "run #{} of '{}' {outcome}",
        report.run_id, report.workflow
    );

    let width = report
        .tasks
        .keys()
        .map(|id| id.len())
        .max()
        .unwrap_or(0);

    for (id, status) in report.tasks.iter() {
        let state = state_label(status.state);
        let _ = write!(
            out,
            "  {id:<width$}  {state:<15}  attempts={}",
            status.attempts
        );
        if let Some(ref err) = status.last_error {
            if matches!(status.state, TaskState::Failed) {
                let _ = write!(out, "  last_error: {err}");
            }
        }
        out.push('\n');
    }

    out
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Pending => "pending",
        TaskState::Running => "running",
        TaskState::Succeeded => "succeeded",
        TaskState::Failed => "failed",
        TaskState::UpstreamFailed => "upstream_failed",
        TaskState::Skipped => "skipped",
    }
}
