//! Run tally and exit-code policy

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::api::{ApiError, BatchResult, ResultFailure, ResultStatus};
use crate::config::{ExecutionRule, RunTestsConfig};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Flags turning recoverable conditions into a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strictness {
    pub fail_on_critical_errors: bool,
    pub fail_on_missing_tests: bool,
    pub fail_on_timeout: bool,
}

impl From<&RunTestsConfig> for Strictness {
    fn from(config: &RunTestsConfig) -> Self {
        Self {
            fail_on_critical_errors: config.fail_on_critical_errors,
            fail_on_missing_tests: config.fail_on_missing_tests,
            fail_on_timeout: config.fail_on_timeout,
        }
    }
}

/// Where in the run a remote error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Search,
    Lookup,
    Trigger,
    Batch,
    Results,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Search => "test search",
            Self::Lookup => "test lookup",
            Self::Trigger => "trigger",
            Self::Batch => "batch status",
            Self::Results => "result polling",
        };
        f.write_str(name)
    }
}

/// A remote error that is neither a missing test nor a test failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalError {
    pub stage: Stage,
    pub public_ids: Vec<String>,
    pub endpoint: String,
    pub status: Option<u16>,
    /// e.g. "authorization error"
    pub classification: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CriticalError {
    pub fn from_api(stage: Stage, public_ids: Vec<String>, error: &ApiError) -> Self {
        Self {
            stage,
            public_ids,
            endpoint: error.endpoint().to_string(),
            status: error.status(),
            classification: error.describe().to_string(),
            message: error.body().to_string(),
            hint: error.hint().map(str::to_string),
        }
    }
}

impl fmt::Display for CriticalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.stage)?;
        if !self.public_ids.is_empty() {
            write!(f, " for {}", self.public_ids.join(", "))?;
        }
        match self.status {
            Some(status) => write!(f, ": HTTP {} ({})", status, self.classification)?,
            None => write!(f, ": {}", self.classification)?,
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Final classification of one test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    Passed,
    Failed,
    FailedNonBlocking,
    Skipped,
    TimedOut,
}

impl ResultOutcome {
    /// Classify a batch result under the test's resolved execution rule
    pub fn classify(result: &BatchResult, rule: ExecutionRule) -> Self {
        let timed_out =
            result.timed_out.unwrap_or(false) || result.status == ResultStatus::InProgress;

        match result.status {
            ResultStatus::Skipped => Self::Skipped,
            _ if timed_out => Self::timed_out(rule),
            ResultStatus::Passed => Self::Passed,
            _ if rule == ExecutionRule::NonBlocking => Self::FailedNonBlocking,
            _ => Self::Failed,
        }
    }

    /// Outcome of an execution that did not finish before the deadline
    pub fn timed_out(rule: ExecutionRule) -> Self {
        if rule == ExecutionRule::NonBlocking {
            Self::FailedNonBlocking
        } else {
            Self::TimedOut
        }
    }
}

/// One test execution as reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub public_id: String,
    pub result_id: String,
    pub location: String,
    pub outcome: ResultOutcome,
    pub execution_rule: ExecutionRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResultFailure>,
}

/// Tally of one completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub passed: usize,
    pub failed: usize,
    pub failed_non_blocking: usize,
    pub skipped: usize,
    pub timed_out: usize,
    pub tests_not_found: BTreeSet<String>,
    pub critical_errors: Vec<CriticalError>,
    pub results: Vec<TestResult>,
}

impl Summary {
    pub fn record(&mut self, result: TestResult) {
        match result.outcome {
            ResultOutcome::Passed => self.passed += 1,
            ResultOutcome::Failed => self.failed += 1,
            ResultOutcome::FailedNonBlocking => self.failed_non_blocking += 1,
            ResultOutcome::Skipped => self.skipped += 1,
            ResultOutcome::TimedOut => self.timed_out += 1,
        }
        self.results.push(result);
    }

    pub fn missing(&mut self, public_id: impl Into<String>) {
        self.tests_not_found.insert(public_id.into());
    }

    pub fn critical(&mut self, error: CriticalError) {
        self.critical_errors.push(error);
    }

    /// Reasons the run fails under `strictness`, empty when it passes
    pub fn exit_reasons(&self, strictness: Strictness) -> Vec<ExitReason> {
        let mut reasons = Vec::new();
        if self.failed > 0 {
            reasons.push(ExitReason::FailedTests(self.failed));
        }
        if strictness.fail_on_critical_errors && !self.critical_errors.is_empty() {
            reasons.push(ExitReason::CriticalErrors(self.critical_errors.len()));
        }
        if strictness.fail_on_missing_tests && !self.tests_not_found.is_empty() {
            reasons.push(ExitReason::MissingTests(self.tests_not_found.len()));
        }
        if strictness.fail_on_timeout && self.timed_out > 0 {
            reasons.push(ExitReason::TimedOut(self.timed_out));
        }
        reasons
    }
}

/// Why a run exits with a failure code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    FailedTests(usize),
    CriticalErrors(usize),
    MissingTests(usize),
    TimedOut(usize),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailedTests(n) => write!(f, "{} blocking test result(s) failed", n),
            Self::CriticalErrors(n) => {
                write!(f, "{} critical error(s) with --fail-on-critical-errors", n)
            }
            Self::MissingTests(n) => {
                write!(f, "{} test(s) not found with --fail-on-missing-tests", n)
            }
            Self::TimedOut(n) => write!(f, "{} result(s) timed out with --fail-on-timeout", n),
        }
    }
}

/// Terminal state of a `run-tests` invocation
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The selection matched nothing; never a failure
    NoTestsToRun,
    Completed(Summary),
}

impl RunOutcome {
    pub fn exit_code(&self, strictness: Strictness) -> i32 {
        match self {
            Self::NoTestsToRun => EXIT_OK,
            Self::Completed(summary) if summary.exit_reasons(strictness).is_empty() => EXIT_OK,
            Self::Completed(_) => EXIT_FAILURE,
        }
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Self::NoTestsToRun => None,
            Self::Completed(summary) => Some(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LENIENT: Strictness = Strictness {
        fail_on_critical_errors: false,
        fail_on_missing_tests: false,
        fail_on_timeout: false,
    };

    const STRICT: Strictness = Strictness {
        fail_on_critical_errors: true,
        fail_on_missing_tests: true,
        fail_on_timeout: true,
    };

    fn batch_result(status: ResultStatus, timed_out: Option<bool>) -> BatchResult {
        BatchResult {
            result_id: "1".to_string(),
            test_public_id: "abc-def-ghi".to_string(),
            status,
            timed_out,
            location: "aws:eu-west-1".to_string(),
            execution_rule: Some(ExecutionRule::Blocking),
            retries: None,
            duration: Some(1200),
        }
    }

    fn test_result(outcome: ResultOutcome) -> TestResult {
        TestResult {
            public_id: "abc-def-ghi".to_string(),
            result_id: "1".to_string(),
            location: "aws:eu-west-1".to_string(),
            outcome,
            execution_rule: ExecutionRule::Blocking,
            duration: None,
            retries: None,
            failure: None,
        }
    }

    #[test]
    fn test_classify() {
        let blocking = ExecutionRule::Blocking;
        let non_blocking = ExecutionRule::NonBlocking;
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::Passed, None), blocking),
            ResultOutcome::Passed
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::Failed, None), blocking),
            ResultOutcome::Failed
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::Failed, None), non_blocking),
            ResultOutcome::FailedNonBlocking
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::Failed, Some(true)), blocking),
            ResultOutcome::TimedOut
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::InProgress, None), blocking),
            ResultOutcome::TimedOut
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::InProgress, None), non_blocking),
            ResultOutcome::FailedNonBlocking
        );
        assert_eq!(
            ResultOutcome::classify(&batch_result(ResultStatus::Skipped, None), blocking),
            ResultOutcome::Skipped
        );
    }

    #[test]
    fn test_timed_out_follows_rule() {
        assert_eq!(ResultOutcome::timed_out(ExecutionRule::Blocking), ResultOutcome::TimedOut);
        assert_eq!(
            ResultOutcome::timed_out(ExecutionRule::NonBlocking),
            ResultOutcome::FailedNonBlocking
        );
    }

    #[test]
    fn test_no_tests_to_run_always_passes() {
        assert_eq!(RunOutcome::NoTestsToRun.exit_code(STRICT), EXIT_OK);
        assert_eq!(RunOutcome::NoTestsToRun.exit_code(LENIENT), EXIT_OK);
    }

    #[test]
    fn test_missing_tests_follow_strictness() {
        let mut summary = Summary::default();
        summary.record(test_result(ResultOutcome::Passed));
        summary.missing("jkl-mno-pqr");

        let outcome = RunOutcome::Completed(summary);
        assert_eq!(outcome.exit_code(LENIENT), EXIT_OK);
        assert_eq!(outcome.exit_code(STRICT), EXIT_FAILURE);
    }

    #[test]
    fn test_timeouts_follow_strictness() {
        let mut summary = Summary::default();
        summary.record(test_result(ResultOutcome::TimedOut));
        assert_eq!(summary.timed_out, 1);

        let outcome = RunOutcome::Completed(summary);
        assert_eq!(outcome.exit_code(LENIENT), EXIT_OK);
        assert_eq!(outcome.exit_code(STRICT), EXIT_FAILURE);
    }

    #[test]
    fn test_critical_errors_follow_strictness() {
        let mut summary = Summary::default();
        let error = ApiError::from_status(
            "/api/v1/synthetics/tests/trigger/ci",
            502,
            "bad gateway".to_string(),
        );
        summary.critical(CriticalError::from_api(
            Stage::Trigger,
            vec!["abc-def-ghi".to_string()],
            &error,
        ));

        let outcome = RunOutcome::Completed(summary);
        assert_eq!(outcome.exit_code(LENIENT), EXIT_OK);
        assert_eq!(outcome.exit_code(STRICT), EXIT_FAILURE);
    }

    #[test]
    fn test_blocking_failures_always_fail() {
        let mut summary = Summary::default();
        summary.record(test_result(ResultOutcome::Failed));
        assert_eq!(summary.exit_reasons(LENIENT), vec![ExitReason::FailedTests(1)]);
        assert_eq!(RunOutcome::Completed(summary).exit_code(LENIENT), EXIT_FAILURE);
    }

    #[test]
    fn test_non_blocking_failures_never_fail() {
        let mut summary = Summary::default();
        summary.record(test_result(ResultOutcome::FailedNonBlocking));
        summary.record(test_result(ResultOutcome::Skipped));
        assert_eq!(RunOutcome::Completed(summary).exit_code(STRICT), EXIT_OK);
    }

    #[test]
    fn test_critical_error_display() {
        let error = ApiError::from_status(
            "/api/v1/synthetics/tests/abc-def-ghi",
            403,
            "Forbidden".to_string(),
        );
        let critical =
            CriticalError::from_api(Stage::Lookup, vec!["abc-def-ghi".to_string()], &error);
        assert_eq!(
            critical.to_string(),
            "test lookup failed for abc-def-ghi: HTTP 403 (authorization error): Forbidden"
        );
        assert!(critical.hint.is_some());
    }
}
