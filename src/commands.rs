//! CLI command definitions
//!
//! Defines the clap commands for the synthetics CLI.

use clap::{Args, Subcommand};

use crate::common::Result;
use crate::config::{PartialRunTestsConfig, VariableString};

#[derive(Subcommand)]
pub enum Commands {
    /// Trigger synthetic tests and wait for their results
    #[command(name = "run-tests")]
    RunTests(RunTestsArgs),

    /// Print the resolved configuration with secrets redacted
    Config(RunTestsArgs),
}

/// Flags of `run-tests`; every flag left out inherits from lower layers
#[derive(Args, Debug, Clone, Default)]
pub struct RunTestsArgs {
    /// Path to the JSON config file (default: datadog-ci.json)
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub app_key: Option<String>,

    /// Datadog site, e.g. datadoghq.eu
    #[arg(long)]
    pub site: Option<String>,

    /// Custom subdomain used in result links
    #[arg(long)]
    pub subdomain: Option<String>,

    /// Public id of a test to run (repeatable)
    #[arg(long = "public-id", short = 'p')]
    pub public_ids: Vec<String>,

    /// Search query selecting the tests to run
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Glob matching test definition files (repeatable)
    #[arg(long, short = 'f')]
    pub files: Vec<String>,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    pub json_report: Option<String>,

    /// Fail the run on critical errors
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fail_on_critical_errors: Option<bool>,

    /// Fail the run when a selected test does not exist
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fail_on_missing_tests: Option<bool>,

    /// Fail the run when a result times out
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub fail_on_timeout: Option<bool>,

    /// Milliseconds to wait for the whole batch
    #[arg(long)]
    pub batch_timeout: Option<u64>,

    /// Deprecated, use --batch-timeout
    #[arg(long)]
    pub polling_timeout: Option<u64>,

    /// Maximum concurrent test lookups
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Test variable as KEY=VALUE (repeatable)
    #[arg(long = "variable", short = 'v')]
    pub variables: Vec<VariableString>,

    /// Override as KEY=VALUE, e.g. retry.count=2 (repeatable)
    #[arg(long = "override")]
    pub overrides: Vec<String>,
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

impl RunTestsArgs {
    /// The CLI configuration layer
    pub fn into_layer(self) -> Result<PartialRunTestsConfig> {
        let mut layer = PartialRunTestsConfig {
            api_key: self.api_key,
            app_key: self.app_key,
            batch_timeout: self.batch_timeout,
            concurrency: self.concurrency,
            config_path: self.config,
            datadog_site: self.site,
            fail_on_critical_errors: self.fail_on_critical_errors,
            fail_on_missing_tests: self.fail_on_missing_tests,
            fail_on_timeout: self.fail_on_timeout,
            files: non_empty(self.files),
            json_report: self.json_report,
            public_ids: non_empty(self.public_ids),
            subdomain: self.subdomain,
            test_search_query: self.search,
            variable_strings: non_empty(self.variables),
            ..Default::default()
        };

        if let Some(timeout) = self.polling_timeout {
            layer.overrides_mut().polling_timeout = Some(timeout);
        }
        for assignment in &self.overrides {
            layer.overrides_mut().apply_assignment(assignment)?;
        }
        Ok(layer)
    }
}
