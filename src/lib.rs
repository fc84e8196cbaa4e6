//! Synthetics CI - orchestration of remote synthetic test runs
//!
//! This library resolves the layered `run-tests` configuration, triggers
//! the selected tests, polls their results, and maps the run to an exit code.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod run;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use config::{resolve_config, resolve_test_overrides, RunTestsConfig};
