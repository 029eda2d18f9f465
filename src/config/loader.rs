// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a workflow file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (DAG correctness, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a workflow file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - missing / ambiguous task actions,
///   - unknown `after` references and self-dependencies,
///   - DAG cycles,
///   - malformed duration strings and trigger rules.
///
/// The resulting `ConfigFile` can be turned into a `TaskGraph` without
/// further checking.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve a default workflow file path.
///
/// Currently this just returns `Workflow.toml` in the current working
/// directory; kept as a function so an env var or search path can be added
/// later without touching callers.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Workflow.toml")
}
