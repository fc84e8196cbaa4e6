//! Layered configuration resolution
//!
//! Precedence, lowest to highest: defaults, config file, environment, CLI.
//! Test definition files add one more layer per test at trigger time.

use std::path::Path;

use crate::common::Result;

use super::command::{PartialRunTestsConfig, RunTestsConfig, DEFAULT_CONFIG_PATH};
use super::deprecated::Reconciled;
use super::env::{env_layer, EnvSnapshot};
use super::file::load_config_file;
use super::merge::Merge;
use super::overrides::OverrideSet;

/// The three sparse layers merged on top of the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSources {
    pub file: PartialRunTestsConfig,
    pub env: PartialRunTestsConfig,
    pub cli: PartialRunTestsConfig,
}

impl ConfigSources {
    /// Build the env layer from the snapshot and read the config file.
    ///
    /// The config path comes from the CLI, then the environment; only then
    /// is the default path used, and a missing default file is not an error.
    pub fn load(env: &EnvSnapshot, cli: PartialRunTestsConfig) -> Result<Self> {
        let env = env_layer(env)?;
        let explicit_path = cli.config_path.as_deref().or(env.config_path.as_deref());
        let file = match explicit_path {
            Some(path) => load_config_file(Path::new(path), true)?,
            None => load_config_file(Path::new(DEFAULT_CONFIG_PATH), false)?,
        };
        Ok(Self { file, env, cli })
    }
}

/// Merge the layers onto `base` and reconcile deprecated fields
pub fn resolve_config(base: RunTestsConfig, sources: ConfigSources) -> RunTestsConfig {
    let reconciled = Reconciled::compute(&base, &[&sources.file, &sources.env, &sources.cli]);

    let mut config = base;
    for layer in [sources.file, sources.env, sources.cli] {
        config.apply(layer);
    }
    reconciled.write(&mut config);

    tracing::debug!(
        batch_timeout = config.batch_timeout,
        site = %config.datadog_site,
        "Resolved configuration"
    );
    config
}

/// Merge one test's override block onto the global overrides
pub fn resolve_test_overrides(global: &OverrideSet, test: &OverrideSet) -> OverrideSet {
    let mut resolved = global.clone();
    resolved.merge(test.clone());
    resolved
}
