//! Command configuration for `run-tests`
//!
//! [`RunTestsConfig`] is the fully resolved configuration. Each source layer
//! (config file, environment, CLI) produces a sparse
//! [`PartialRunTestsConfig`] in which only explicitly set fields are present.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{mask_secret, Error};

use super::coerce;
use super::merge::{nested, replace, Merge};
use super::overrides::{BasicAuth, OverrideSet};

/// Default batch timeout: 30 minutes, in milliseconds
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default delay between two batch status requests, in milliseconds
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 5_000;

/// Default number of concurrent test lookups
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Config file read when no path is given explicitly
pub const DEFAULT_CONFIG_PATH: &str = "datadog-ci.json";

/// Default test definition file glob
pub const DEFAULT_FILES_GLOB: &str = "**/*.synthetics.json";

/// Proxy used for every API request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    /// `http`, `https`, `socks5`, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
}

impl ProxyConfig {
    /// Proxy URL, or `None` when no host is configured
    pub fn url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let protocol = self.protocol.as_deref().unwrap_or("http");
        Some(match self.port {
            Some(port) => format!("{protocol}://{host}:{port}"),
            None => format!("{protocol}://{host}"),
        })
    }
}

impl Merge for ProxyConfig {
    fn merge(&mut self, overlay: Self) {
        replace(&mut self.protocol, overlay.protocol);
        replace(&mut self.host, overlay.host);
        replace(&mut self.port, overlay.port);
        nested(&mut self.auth, overlay.auth);
    }
}

/// A `KEY=VALUE` test variable from the deprecated `variableStrings`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct VariableString {
    pub key: String,
    pub value: String,
}

impl FromStr for VariableString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = coerce::parse_variable(s)?;
        Ok(Self { key, value })
    }
}

impl TryFrom<String> for VariableString {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for VariableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Fully resolved `run-tests` configuration
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunTestsConfig {
    pub api_key: String,
    pub app_key: String,
    /// Milliseconds to wait for the whole batch
    pub batch_timeout: u64,
    pub concurrency: usize,
    pub config_path: String,
    pub datadog_site: String,
    pub default_test_overrides: OverrideSet,
    pub fail_on_critical_errors: bool,
    pub fail_on_missing_tests: bool,
    pub fail_on_timeout: bool,
    pub files: Vec<String>,
    /// Deprecated alias of `defaultTestOverrides`; only `pollingTimeout` is kept
    pub global: OverrideSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_report: Option<String>,
    /// Milliseconds between two batch status requests
    pub polling_interval: u64,
    pub proxy: ProxyConfig,
    pub public_ids: Vec<String>,
    pub subdomain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_search_query: Option<String>,
}

impl Default for RunTestsConfig {
    fn default() -> Self {
        let polling_timeout = OverrideSet {
            polling_timeout: Some(DEFAULT_BATCH_TIMEOUT_MS),
            ..Default::default()
        };
        Self {
            api_key: String::new(),
            app_key: String::new(),
            batch_timeout: DEFAULT_BATCH_TIMEOUT_MS,
            concurrency: DEFAULT_CONCURRENCY,
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            datadog_site: "datadoghq.com".to_string(),
            default_test_overrides: polling_timeout.clone(),
            fail_on_critical_errors: false,
            fail_on_missing_tests: false,
            fail_on_timeout: true,
            files: vec![DEFAULT_FILES_GLOB.to_string()],
            global: polling_timeout,
            json_report: None,
            polling_interval: DEFAULT_POLLING_INTERVAL_MS,
            proxy: ProxyConfig::default(),
            public_ids: Vec::new(),
            subdomain: "app".to_string(),
            test_search_query: None,
        }
    }
}

fn assign<T>(slot: &mut T, overlay: Option<T>) {
    if let Some(value) = overlay {
        *slot = value;
    }
}

impl RunTestsConfig {
    /// Merge one source layer onto this configuration.
    ///
    /// Deprecated fields are not handled here; see `deprecated::Reconciled`.
    pub fn apply(&mut self, layer: PartialRunTestsConfig) {
        assign(&mut self.api_key, layer.api_key);
        assign(&mut self.app_key, layer.app_key);
        assign(&mut self.batch_timeout, layer.batch_timeout);
        assign(&mut self.concurrency, layer.concurrency);
        assign(&mut self.config_path, layer.config_path);
        assign(&mut self.datadog_site, layer.datadog_site);
        // `global` sits below `defaultTestOverrides` within the same layer
        if let Some(global) = layer.global {
            self.default_test_overrides.merge(global);
        }
        if let Some(overrides) = layer.default_test_overrides {
            self.default_test_overrides.merge(overrides);
        }
        assign(&mut self.fail_on_critical_errors, layer.fail_on_critical_errors);
        assign(&mut self.fail_on_missing_tests, layer.fail_on_missing_tests);
        assign(&mut self.fail_on_timeout, layer.fail_on_timeout);
        assign(&mut self.files, layer.files);
        replace(&mut self.json_report, layer.json_report);
        assign(&mut self.polling_interval, layer.polling_interval);
        if let Some(proxy) = layer.proxy {
            self.proxy.merge(proxy);
        }
        assign(&mut self.public_ids, layer.public_ids);
        assign(&mut self.subdomain, layer.subdomain);
        replace(&mut self.test_search_query, layer.test_search_query);
    }

    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.api_key = mask_secret(&config.api_key);
        config.app_key = mask_secret(&config.app_key);
        for auth in [
            config.proxy.auth.as_mut(),
            config.default_test_overrides.basic_auth.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(password) = auth.password.as_mut() {
                *password = mask_secret(password);
            }
        }
        config
    }
}

/// One sparse configuration layer
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialRunTestsConfig {
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub batch_timeout: Option<u64>,
    pub concurrency: Option<usize>,
    /// Only settable from the environment or the CLI
    #[serde(skip_deserializing)]
    pub config_path: Option<String>,
    pub datadog_site: Option<String>,
    pub default_test_overrides: Option<OverrideSet>,
    pub fail_on_critical_errors: Option<bool>,
    pub fail_on_missing_tests: Option<bool>,
    pub fail_on_timeout: Option<bool>,
    pub files: Option<Vec<String>>,
    /// Deprecated alias of `defaultTestOverrides`
    pub global: Option<OverrideSet>,
    pub json_report: Option<String>,
    /// Deprecated, folded into `defaultTestOverrides.locations`
    pub locations: Option<Vec<String>>,
    pub polling_interval: Option<u64>,
    pub proxy: Option<ProxyConfig>,
    pub public_ids: Option<Vec<String>>,
    pub subdomain: Option<String>,
    pub test_search_query: Option<String>,
    /// Deprecated, folded into `defaultTestOverrides.variables`
    pub variable_strings: Option<Vec<VariableString>>,
}

impl PartialRunTestsConfig {
    /// Overrides block of this layer, created on first write
    pub fn overrides_mut(&mut self) -> &mut OverrideSet {
        self.default_test_overrides.get_or_insert_with(OverrideSet::default)
    }
}
