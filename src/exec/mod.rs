// src/exec/mod.rs

//! Attempt execution layer.
//!
//! This module realizes the executor boundary for the `taskdag` binary,
//! using `tokio::process::Command`, and reports back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the [`Executor`] trait and the concrete
//!   [`ProcessExecutor`] the runtime uses in production; tests replace it
//!   with a fake implementation.
//! - [`executor_loop`] owns the loop that manages attempt processes.
//! - [`attempt_runner`] handles one attempt process: environment, stdin
//!   payloads, timeout and cancellation.

pub mod attempt_runner;
pub mod backend;
pub mod executor_loop;

pub use backend::{Executor, ProcessExecutor};
