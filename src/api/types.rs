//! Synthetics API payloads

use serde::{Deserialize, Serialize};

use crate::config::{ExecutionRule, OverrideSet};

/// A test definition as returned by the API
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Test {
    pub public_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub test_type: String,
    #[serde(default)]
    pub options: TestOptions,
}

impl Test {
    /// Execution rule configured on the test itself
    pub fn execution_rule(&self) -> Option<ExecutionRule> {
        self.options.ci.as_ref().and_then(|ci| ci.execution_rule)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TestOptions {
    #[serde(default)]
    pub ci: Option<CiOptions>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiOptions {
    #[serde(default)]
    pub execution_rule: Option<ExecutionRule>,
}

/// Response of the search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestSearchResponse {
    #[serde(default)]
    pub tests: Vec<TestSummary>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TestSummary {
    pub public_id: String,
}

/// One test in a trigger request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TestPayload {
    pub public_id: String,
    #[serde(flatten)]
    pub overrides: OverrideSet,
}

/// Body of the CI trigger request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TriggerPayload {
    pub tests: Vec<TestPayload>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TriggerResponse {
    pub batch_id: String,
}

/// Status of a batch or of one result within it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    InProgress,
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Batch {
    pub status: ResultStatus,
    #[serde(default)]
    pub results: Vec<BatchResult>,
}

/// One test execution (test x location) in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub result_id: String,
    pub test_public_id: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub timed_out: Option<bool>,
    #[serde(default)]
    pub location: String,
    /// Rule the test ran under, as echoed from the trigger request
    #[serde(default)]
    pub execution_rule: Option<ExecutionRule>,
    #[serde(default)]
    pub retries: Option<u32>,
    /// Milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Detailed result from the poll endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolledResult {
    pub result_id: String,
    #[serde(default)]
    pub result: Option<ResultDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultDetail {
    #[serde(default)]
    pub failure: Option<ResultFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollResultsResponse {
    #[serde(default)]
    pub results: Vec<PolledResult>,
}
