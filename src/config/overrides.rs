//! Test override model
//!
//! An [`OverrideSet`] is the bundle of test-execution parameters that can be
//! supplied by the config file, the environment, the CLI, and each test
//! definition file. Every field is optional: `None` means "inherit".

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

use super::coerce;
use super::merge::{nested, replace, Merge};

/// How a failing test affects the CI run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionRule {
    /// A failure fails the run
    #[default]
    Blocking,
    /// A failure is reported but never fails the run
    NonBlocking,
    /// The test is not triggered at all
    Skipped,
}

impl FromStr for ExecutionRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(Self::Blocking),
            "non_blocking" | "non-blocking" => Ok(Self::NonBlocking),
            "skipped" => Ok(Self::Skipped),
            _ => Err("expected one of: blocking, non_blocking, skipped".to_string()),
        }
    }
}

impl fmt::Display for ExecutionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocking => "blocking",
            Self::NonBlocking => "non_blocking",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// HTTP basic authentication credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BasicAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Merge for BasicAuth {
    fn merge(&mut self, overlay: Self) {
        replace(&mut self.username, overlay.username);
        replace(&mut self.password, overlay.password);
    }
}

/// Cookies sent with the test request
///
/// Accepts either a bare cookie string or `{"value": ..., "append": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "CookiesInput")]
pub struct Cookies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Append to the test's own cookies instead of replacing them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CookiesInput {
    Value(String),
    Full {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        append: Option<bool>,
    },
}

impl From<CookiesInput> for Cookies {
    fn from(input: CookiesInput) -> Self {
        match input {
            CookiesInput::Value(value) => Self {
                value: Some(value),
                append: None,
            },
            CookiesInput::Full { value, append } => Self { value, append },
        }
    }
}

impl Merge for Cookies {
    fn merge(&mut self, overlay: Self) {
        replace(&mut self.value, overlay.value);
        replace(&mut self.append, overlay.append);
    }
}

/// Retry policy for a failed test
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Milliseconds between attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

impl Merge for RetryPolicy {
    fn merge(&mut self, overlay: Self) {
        replace(&mut self.count, overlay.count);
        replace(&mut self.interval, overlay.interval);
    }
}

/// Test-execution parameters that can be overridden at every layer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct OverrideSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_insecure_certificates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Cookies>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_step_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_rule: Option<ExecutionRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_application_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_application_version_file_path: Option<String>,
    /// Deprecated twin of `batchTimeout`, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_url_substitution_regexes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url_substitution_regex: Option<String>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

impl Merge for OverrideSet {
    fn merge(&mut self, overlay: Self) {
        replace(&mut self.allow_insecure_certificates, overlay.allow_insecure_certificates);
        nested(&mut self.basic_auth, overlay.basic_auth);
        replace(&mut self.body, overlay.body);
        replace(&mut self.body_type, overlay.body_type);
        nested(&mut self.cookies, overlay.cookies);
        replace(&mut self.default_step_timeout, overlay.default_step_timeout);
        replace(&mut self.device_ids, overlay.device_ids);
        replace(&mut self.execution_rule, overlay.execution_rule);
        replace(&mut self.follow_redirects, overlay.follow_redirects);
        nested(&mut self.headers, overlay.headers);
        replace(&mut self.locations, overlay.locations);
        replace(&mut self.mobile_application_version, overlay.mobile_application_version);
        replace(
            &mut self.mobile_application_version_file_path,
            overlay.mobile_application_version_file_path,
        );
        replace(&mut self.polling_timeout, overlay.polling_timeout);
        replace(
            &mut self.resource_url_substitution_regexes,
            overlay.resource_url_substitution_regexes,
        );
        nested(&mut self.retry, overlay.retry);
        replace(&mut self.start_url, overlay.start_url);
        replace(&mut self.start_url_substitution_regex, overlay.start_url_substitution_regex);
        replace(&mut self.test_timeout, overlay.test_timeout);
        nested(&mut self.variables, overlay.variables);
    }
}

/// An override field addressable from the environment and `--override`
#[derive(Debug, Clone, Copy)]
pub struct OverrideKey {
    /// Dotted key accepted by `--override KEY=VALUE`
    pub key: &'static str,
    /// Suffix of the `DATADOG_SYNTHETICS_OVERRIDE_` environment variable
    pub env: &'static str,
}

/// Every override field settable from a raw string
pub const OVERRIDE_KEYS: &[OverrideKey] = &[
    OverrideKey {
        key: "allowInsecureCertificates",
        env: "ALLOW_INSECURE_CERTIFICATES",
    },
    OverrideKey {
        key: "basicAuth.username",
        env: "BASIC_AUTH_USERNAME",
    },
    OverrideKey {
        key: "basicAuth.password",
        env: "BASIC_AUTH_PASSWORD",
    },
    OverrideKey {
        key: "body",
        env: "BODY",
    },
    OverrideKey {
        key: "bodyType",
        env: "BODY_TYPE",
    },
    OverrideKey {
        key: "cookies",
        env: "COOKIES",
    },
    OverrideKey {
        key: "cookies.append",
        env: "COOKIES_APPEND",
    },
    OverrideKey {
        key: "defaultStepTimeout",
        env: "DEFAULT_STEP_TIMEOUT",
    },
    OverrideKey {
        key: "deviceIds",
        env: "DEVICE_IDS",
    },
    OverrideKey {
        key: "executionRule",
        env: "EXECUTION_RULE",
    },
    OverrideKey {
        key: "followRedirects",
        env: "FOLLOW_REDIRECTS",
    },
    OverrideKey {
        key: "headers",
        env: "HEADERS",
    },
    OverrideKey {
        key: "locations",
        env: "LOCATIONS",
    },
    OverrideKey {
        key: "mobileApplicationVersion",
        env: "MOBILE_APPLICATION_VERSION",
    },
    OverrideKey {
        key: "mobileApplicationVersionFilePath",
        env: "MOBILE_APPLICATION_VERSION_FILE_PATH",
    },
    OverrideKey {
        key: "pollingTimeout",
        env: "POLLING_TIMEOUT",
    },
    OverrideKey {
        key: "resourceUrlSubstitutionRegexes",
        env: "RESOURCE_URL_SUBSTITUTION_REGEXES",
    },
    OverrideKey {
        key: "retry.count",
        env: "RETRY_COUNT",
    },
    OverrideKey {
        key: "retry.interval",
        env: "RETRY_INTERVAL",
    },
    OverrideKey {
        key: "startUrl",
        env: "START_URL",
    },
    OverrideKey {
        key: "startUrlSubstitutionRegex",
        env: "START_URL_SUBSTITUTION_REGEX",
    },
    OverrideKey {
        key: "testTimeout",
        env: "TEST_TIMEOUT",
    },
    OverrideKey {
        key: "variables",
        env: "VARIABLES",
    },
];

impl OverrideSet {
    /// Set one field from a raw string, coercing it to the field's type.
    ///
    /// `headers.<NAME>` and `variables.<NAME>` set a single map entry.
    /// Absent input leaves the field untouched.
    pub fn set(&mut self, key: &str, raw: Option<&str>) -> Result<()> {
        if let Some(name) = key.strip_prefix("headers.") {
            return set_entry(&mut self.headers, name, raw);
        }
        if let Some(name) = key.strip_prefix("variables.") {
            return set_entry(&mut self.variables, name, raw);
        }

        match key {
            "allowInsecureCertificates" => {
                replace(&mut self.allow_insecure_certificates, coerce::to_bool(key, raw)?)
            }
            "basicAuth.username" => {
                if let Some(username) = coerce::to_string(raw) {
                    nested(
                        &mut self.basic_auth,
                        Some(BasicAuth {
                            username: Some(username),
                            password: None,
                        }),
                    );
                }
            }
            "basicAuth.password" => {
                if let Some(password) = coerce::to_string(raw) {
                    nested(
                        &mut self.basic_auth,
                        Some(BasicAuth {
                            username: None,
                            password: Some(password),
                        }),
                    );
                }
            }
            "body" => replace(&mut self.body, coerce::to_string(raw)),
            "bodyType" => replace(&mut self.body_type, coerce::to_string(raw)),
            "cookies" | "cookies.value" => {
                if let Some(value) = coerce::to_string(raw) {
                    nested(
                        &mut self.cookies,
                        Some(Cookies {
                            value: Some(value),
                            append: None,
                        }),
                    );
                }
            }
            "cookies.append" => {
                if let Some(append) = coerce::to_bool(key, raw)? {
                    nested(
                        &mut self.cookies,
                        Some(Cookies {
                            value: None,
                            append: Some(append),
                        }),
                    );
                }
            }
            "defaultStepTimeout" => {
                replace(&mut self.default_step_timeout, coerce::to_number(key, raw)?)
            }
            "deviceIds" => replace(&mut self.device_ids, coerce::to_string_list(raw)),
            "executionRule" => {
                replace(&mut self.execution_rule, coerce::to_execution_rule(key, raw)?)
            }
            "followRedirects" => replace(&mut self.follow_redirects, coerce::to_bool(key, raw)?),
            "headers" => nested(&mut self.headers, coerce::to_string_map(key, raw)?),
            "locations" => replace(&mut self.locations, coerce::to_string_list(raw)),
            "mobileApplicationVersion" => {
                replace(&mut self.mobile_application_version, coerce::to_string(raw))
            }
            "mobileApplicationVersionFilePath" => replace(
                &mut self.mobile_application_version_file_path,
                coerce::to_string(raw),
            ),
            "pollingTimeout" => replace(&mut self.polling_timeout, coerce::to_number(key, raw)?),
            "resourceUrlSubstitutionRegexes" => replace(
                &mut self.resource_url_substitution_regexes,
                coerce::to_string_list(raw),
            ),
            "retry.count" => {
                if let Some(count) = coerce::to_number(key, raw)? {
                    nested(
                        &mut self.retry,
                        Some(RetryPolicy {
                            count: Some(count),
                            interval: None,
                        }),
                    );
                }
            }
            "retry.interval" => {
                if let Some(interval) = coerce::to_number(key, raw)? {
                    nested(
                        &mut self.retry,
                        Some(RetryPolicy {
                            count: None,
                            interval: Some(interval),
                        }),
                    );
                }
            }
            "startUrl" => replace(&mut self.start_url, coerce::to_string(raw)),
            "startUrlSubstitutionRegex" => {
                replace(&mut self.start_url_substitution_regex, coerce::to_string(raw))
            }
            "testTimeout" => replace(&mut self.test_timeout, coerce::to_number(key, raw)?),
            "variables" => nested(&mut self.variables, coerce::to_string_map(key, raw)?),
            _ => return Err(Error::parse("override", key, "unknown override key")),
        }
        Ok(())
    }

    /// Apply a `KEY=VALUE` assignment from the `--override` flag
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| Error::parse("override", assignment, "expected KEY=VALUE"))?;
        self.set(key.trim(), Some(value))
    }
}

fn set_entry(
    map: &mut Option<BTreeMap<String, String>>,
    name: &str,
    raw: Option<&str>,
) -> Result<()> {
    if name.is_empty() {
        return Err(Error::parse("override", name, "missing map key"));
    }
    if let Some(value) = raw {
        map.get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
    }
    Ok(())
}
