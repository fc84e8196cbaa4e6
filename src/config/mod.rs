//! Configuration resolution
//!
//! Implements the layered merge:
//! 1. Built-in defaults
//! 2. JSON config file (`datadog-ci.json` or `--config`)
//! 3. Environment variables
//! 4. CLI flags
//!
//! followed by deprecated-field reconciliation, and the per-test merge of
//! test definition overrides at trigger time.

pub mod coerce;
mod command;
mod deprecated;
mod env;
mod file;
mod merge;
mod overrides;
mod resolve;

pub use command::{
    PartialRunTestsConfig, ProxyConfig, RunTestsConfig, VariableString, DEFAULT_BATCH_TIMEOUT_MS,
    DEFAULT_CONCURRENCY, DEFAULT_CONFIG_PATH, DEFAULT_FILES_GLOB, DEFAULT_POLLING_INTERVAL_MS,
};
pub use deprecated::{Deprecated, SyncRule};
pub use env::{env_layer, EnvSnapshot, OVERRIDE_PREFIX};
pub use file::load_config_file;
pub use merge::Merge;
pub use overrides::{
    BasicAuth, Cookies, ExecutionRule, OverrideKey, OverrideSet, RetryPolicy, OVERRIDE_KEYS,
};
pub use resolve::{resolve_config, resolve_test_overrides, ConfigSources};
