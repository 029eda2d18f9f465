// src/config/mod.rs

//! Workflow definition loading and validation.
//!
//! - [`model`] maps the TOML file structure.
//! - [`loader`] reads and deserializes files.
//! - [`validate`] turns a [`model::RawConfigFile`] into a checked
//!   [`model::ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate};
pub use model::{parse_duration, ConfigFile, RawConfigFile, TaskConfig, WorkflowSection};
