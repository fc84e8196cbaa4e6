//! Environment variable layer
//!
//! The process environment is captured once into an [`EnvSnapshot`]; the
//! merge logic only ever sees that snapshot.

use std::collections::BTreeMap;

use crate::common::Result;

use super::coerce;
use super::command::PartialRunTestsConfig;
use super::overrides::{OverrideSet, OVERRIDE_KEYS};

/// Prefix of every per-override environment variable
pub const OVERRIDE_PREFIX: &str = "DATADOG_SYNTHETICS_OVERRIDE_";

/// Immutable copy of the environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment, skipping non-UTF-8 entries
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Build the environment layer. Unset variables leave their field absent.
pub fn env_layer(env: &EnvSnapshot) -> Result<PartialRunTestsConfig> {
    let public_ids = coerce::to_string_list(env.get("DATADOG_SYNTHETICS_PUBLIC_IDS")).or_else(|| {
        let legacy = coerce::to_string_list(env.get("DATADOG_SYNTHETICS_TEST_IDS"));
        if legacy.is_some() {
            tracing::warn!(
                "DATADOG_SYNTHETICS_TEST_IDS is deprecated, use DATADOG_SYNTHETICS_PUBLIC_IDS instead"
            );
        }
        legacy
    });

    let mut layer = PartialRunTestsConfig {
        api_key: coerce::to_string(env.get("DATADOG_API_KEY")),
        app_key: coerce::to_string(env.get("DATADOG_APP_KEY")),
        batch_timeout: coerce::to_number(
            "DATADOG_SYNTHETICS_BATCH_TIMEOUT",
            env.get("DATADOG_SYNTHETICS_BATCH_TIMEOUT"),
        )?,
        config_path: coerce::to_string(env.get("DATADOG_SYNTHETICS_CONFIG_PATH")),
        datadog_site: coerce::to_string(env.get("DATADOG_SITE")),
        fail_on_critical_errors: coerce::to_bool(
            "DATADOG_SYNTHETICS_FAIL_ON_CRITICAL_ERRORS",
            env.get("DATADOG_SYNTHETICS_FAIL_ON_CRITICAL_ERRORS"),
        )?,
        fail_on_missing_tests: coerce::to_bool(
            "DATADOG_SYNTHETICS_FAIL_ON_MISSING_TESTS",
            env.get("DATADOG_SYNTHETICS_FAIL_ON_MISSING_TESTS"),
        )?,
        fail_on_timeout: coerce::to_bool(
            "DATADOG_SYNTHETICS_FAIL_ON_TIMEOUT",
            env.get("DATADOG_SYNTHETICS_FAIL_ON_TIMEOUT"),
        )?,
        files: coerce::to_string_list(env.get("DATADOG_SYNTHETICS_FILES")),
        json_report: coerce::to_string(env.get("DATADOG_SYNTHETICS_JSON_REPORT")),
        locations: coerce::to_string_list(env.get("DATADOG_SYNTHETICS_LOCATIONS")),
        public_ids,
        subdomain: coerce::to_string(env.get("DATADOG_SUBDOMAIN")),
        test_search_query: coerce::to_string(env.get("DATADOG_SYNTHETICS_TEST_SEARCH_QUERY")),
        ..Default::default()
    };

    let mut overrides = OverrideSet::default();
    for key in OVERRIDE_KEYS {
        let name = format!("{OVERRIDE_PREFIX}{}", key.env);
        overrides.set(key.key, env.get(&name))?;
    }
    // Legacy name of DATADOG_SYNTHETICS_OVERRIDE_POLLING_TIMEOUT
    if overrides.polling_timeout.is_none() {
        overrides.set("pollingTimeout", env.get("DATADOG_SYNTHETICS_POLLING_TIMEOUT"))?;
    }
    if overrides != OverrideSet::default() {
        layer.default_test_overrides = Some(overrides);
    }

    Ok(layer)
}
