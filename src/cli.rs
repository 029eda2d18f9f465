// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdag",
    version,
    about = "Run a DAG of shell and SQL tasks with retries and dependency ordering.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workflow file (TOML).
    ///
    /// Default: `Workflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Workflow.toml")]
    pub config: String,

    /// Run-scoped parameter, `KEY=VALUE`. Repeatable. Parameters are passed
    /// to every task action as environment variables.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the DAG and its dependency batches, but
    /// don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Split `--param KEY=VALUE` occurrences into pairs.
    pub fn param_pairs(&self) -> anyhow::Result<Vec<(String, String)>> {
        self.params
            .iter()
            .map(|raw| match raw.split_once('=') {
                Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
                _ => Err(anyhow::anyhow!(
                    "invalid --param '{raw}': expected KEY=VALUE"
                )),
            })
            .collect()
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
