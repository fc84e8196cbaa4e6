//! Integration tests for the run workflow against an in-memory API
//!
//! `MockApi` serves canned tests, batches, and errors, and records the
//! trigger payloads it receives.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use synthetics::api::{
    ApiError, ApiResult, Batch, PolledResult, SyntheticsApi, Test, TestSummary, TriggerPayload,
    TriggerResponse,
};
use synthetics::config::{ExecutionRule, OverrideSet, RetryPolicy, RunTestsConfig};
use synthetics::run::{
    run_tests, ResultOutcome, RunOutcome, Stage, Strictness, Summary, EXIT_FAILURE, EXIT_OK,
};
use tempfile::TempDir;

#[derive(Default)]
struct MockApi {
    tests: HashMap<String, Test>,
    lookup_errors: HashMap<String, ApiError>,
    search_results: Vec<String>,
    trigger_error: Option<ApiError>,
    /// Served in order; the last one repeats
    batches: Mutex<VecDeque<Batch>>,
    polled: Vec<PolledResult>,
    triggered: Mutex<Vec<TriggerPayload>>,
    batch_requests: Mutex<usize>,
}

impl MockApi {
    fn with_tests(ids: &[&str]) -> Self {
        let mut api = Self::default();
        for id in ids {
            api.add_test(test(id, None));
        }
        api
    }

    fn add_test(&mut self, test: Test) {
        self.tests.insert(test.public_id.clone(), test);
    }

    fn push_batch(&self, batch: Batch) {
        self.batches.lock().unwrap().push_back(batch);
    }

    fn triggered(&self) -> Vec<TriggerPayload> {
        self.triggered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyntheticsApi for MockApi {
    async fn get_test(&self, public_id: &str) -> ApiResult<Test> {
        let endpoint = format!("/api/v1/synthetics/tests/{}", public_id);
        if let Some(error) = self.lookup_errors.get(public_id) {
            return Err(error.clone());
        }
        self.tests
            .get(public_id)
            .cloned()
            .ok_or_else(|| ApiError::from_status(&endpoint, 404, "Not found".to_string()))
    }

    async fn search_tests(&self, _query: &str) -> ApiResult<Vec<TestSummary>> {
        Ok(self
            .search_results
            .iter()
            .map(|id| TestSummary {
                public_id: id.clone(),
            })
            .collect())
    }

    async fn trigger_tests(&self, payload: &TriggerPayload) -> ApiResult<TriggerResponse> {
        self.triggered.lock().unwrap().push(payload.clone());
        match &self.trigger_error {
            Some(error) => Err(error.clone()),
            None => Ok(TriggerResponse {
                batch_id: "batch-1".to_string(),
            }),
        }
    }

    async fn get_batch(&self, batch_id: &str) -> ApiResult<Batch> {
        *self.batch_requests.lock().unwrap() += 1;
        let mut batches = self.batches.lock().unwrap();
        let batch = if batches.len() > 1 {
            batches.pop_front()
        } else {
            batches.front().cloned()
        };
        batch.ok_or_else(|| {
            ApiError::from_status(
                &format!("/api/v1/synthetics/ci/batch/{}", batch_id),
                404,
                String::new(),
            )
        })
    }

    async fn poll_results(&self, _result_ids: &[String]) -> ApiResult<Vec<PolledResult>> {
        Ok(self.polled.clone())
    }
}

fn test(public_id: &str, execution_rule: Option<&str>) -> Test {
    let ci = execution_rule.map(|rule| json!({ "executionRule": rule }));
    serde_json::from_value(json!({
        "public_id": public_id,
        "name": format!("Test {}", public_id),
        "type": "api",
        "options": { "ci": ci },
    }))
    .unwrap()
}

/// A batch whose results are `(public_id, status)` pairs
fn batch(status: &str, results: &[(&str, &str)]) -> Batch {
    let results: Vec<_> = results
        .iter()
        .enumerate()
        .map(|(i, (public_id, status))| {
            json!({
                "result_id": format!("r{}", i),
                "test_public_id": public_id,
                "status": status,
                "location": "aws:eu-west-1",
                "duration": 1500,
            })
        })
        .collect();
    serde_json::from_value(json!({ "status": status, "results": results })).unwrap()
}

fn config(public_ids: &[&str]) -> RunTestsConfig {
    RunTestsConfig {
        api_key: "api".to_string(),
        app_key: "app".to_string(),
        public_ids: public_ids.iter().map(|id| id.to_string()).collect(),
        polling_interval: 1,
        batch_timeout: 2_000,
        ..Default::default()
    }
}

async fn run(api: &MockApi, config: &RunTestsConfig) -> RunOutcome {
    let dir = TempDir::new().unwrap();
    run_tests(api, config, dir.path()).await.unwrap()
}

/// Formatted log output shared with the subscriber under test
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn summary(outcome: &RunOutcome) -> &Summary {
    match outcome {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::NoTestsToRun => panic!("Expected Completed outcome"),
    }
}

#[tokio::test]
async fn test_all_tests_pass() {
    let api = MockApi::with_tests(&["abc-def-ghi", "jkl-mno-pqr"]);
    api.push_batch(batch(
        "in_progress",
        &[("abc-def-ghi", "passed"), ("jkl-mno-pqr", "in_progress")],
    ));
    api.push_batch(batch(
        "passed",
        &[("abc-def-ghi", "passed"), ("jkl-mno-pqr", "passed")],
    ));

    let config = config(&["abc-def-ghi", "jkl-mno-pqr"]);
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.batch_id.as_deref(), Some("batch-1"));
    assert!(summary.critical_errors.is_empty());
    assert_eq!(*api.batch_requests.lock().unwrap(), 2);
    assert_eq!(api.triggered()[0].tests.len(), 2);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_missing_test_is_tallied() {
    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(batch("passed", &[("abc-def-ghi", "passed")]));

    let mut config = config(&["abc-def-ghi", "zzz-zzz-zzz"]);
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.tests_not_found.len(), 1);
    assert!(summary.tests_not_found.contains("zzz-zzz-zzz"));
    assert!(summary.critical_errors.is_empty());
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);

    config.fail_on_missing_tests = true;
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_FAILURE);
}

#[tokio::test]
async fn test_empty_search_has_no_tests_to_run() {
    let api = MockApi::default();
    let config = RunTestsConfig {
        test_search_query: Some("tag:e2e".to_string()),
        fail_on_critical_errors: true,
        fail_on_missing_tests: true,
        fail_on_timeout: true,
        ..config(&[])
    };

    let outcome = run(&api, &config).await;
    assert_eq!(outcome, RunOutcome::NoTestsToRun);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
    assert!(api.triggered().is_empty());
}

#[tokio::test]
async fn test_search_takes_precedence_over_public_ids() {
    let mut api = MockApi::with_tests(&["abc-def-ghi", "jkl-mno-pqr"]);
    api.search_results = vec!["jkl-mno-pqr".to_string()];
    api.push_batch(batch("passed", &[("jkl-mno-pqr", "passed")]));

    let config = RunTestsConfig {
        test_search_query: Some("tag:e2e".to_string()),
        ..config(&["abc-def-ghi"])
    };
    run(&api, &config).await;

    let triggered = api.triggered();
    assert_eq!(triggered[0].tests.len(), 1);
    assert_eq!(triggered[0].tests[0].public_id, "jkl-mno-pqr");
}

#[tokio::test]
async fn test_trigger_server_error_is_critical() {
    let mut api = MockApi::with_tests(&["abc-def-ghi"]);
    api.trigger_error = Some(ApiError::from_status(
        "/api/v1/synthetics/tests/trigger/ci",
        502,
        "Bad Gateway".to_string(),
    ));

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut config = config(&["abc-def-ghi"]);
    config.fail_on_critical_errors = true;
    let outcome = run(&api, &config).await;

    let errors: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("ERROR"))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("abc-def-ghi"));
    assert!(errors[0].contains("502"));

    let summary = summary(&outcome);
    assert_eq!(summary.critical_errors.len(), 1);
    let error = &summary.critical_errors[0];
    assert_eq!(error.stage, Stage::Trigger);
    assert_eq!(error.status, Some(502));
    assert_eq!(error.public_ids, vec!["abc-def-ghi".to_string()]);
    let message = error.to_string();
    assert!(message.contains("abc-def-ghi"));
    assert!(message.contains("502"));
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_FAILURE);

    config.fail_on_critical_errors = false;
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_lookup_authorization_error_is_critical() {
    let mut api = MockApi::with_tests(&["abc-def-ghi"]);
    api.lookup_errors.insert(
        "jkl-mno-pqr".to_string(),
        ApiError::from_status(
            "/api/v1/synthetics/tests/jkl-mno-pqr",
            403,
            "Forbidden".to_string(),
        ),
    );
    api.push_batch(batch("passed", &[("abc-def-ghi", "passed")]));

    let config = config(&["abc-def-ghi", "jkl-mno-pqr"]);
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.passed, 1);
    assert!(summary.tests_not_found.is_empty());
    assert_eq!(summary.critical_errors.len(), 1);
    assert_eq!(summary.critical_errors[0].classification, "authorization error");
    assert!(summary.critical_errors[0].hint.is_some());
}

#[tokio::test]
async fn test_batch_timeout_marks_results_timed_out() {
    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(batch("in_progress", &[("abc-def-ghi", "in_progress")]));

    let mut config = config(&["abc-def-ghi"]);
    config.batch_timeout = 30;
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_FAILURE);

    config.fail_on_timeout = false;
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_unreported_test_times_out() {
    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(batch("in_progress", &[]));

    let mut config = config(&["abc-def-ghi"]);
    config.batch_timeout = 20;
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].public_id, "abc-def-ghi");
    assert_eq!(summary.results[0].outcome, ResultOutcome::TimedOut);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_FAILURE);
}

#[tokio::test]
async fn test_unreported_non_blocking_test_does_not_fail_run() {
    let mut api = MockApi::with_tests(&["abc-def-ghi"]);
    api.add_test(test("jkl-mno-pqr", Some("non_blocking")));
    api.push_batch(batch("passed", &[("abc-def-ghi", "passed")]));

    let config = config(&["abc-def-ghi", "jkl-mno-pqr"]);
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed_non_blocking, 1);
    assert_eq!(summary.timed_out, 0);
    assert_eq!(summary.results[1].public_id, "jkl-mno-pqr");
    assert_eq!(summary.results[1].execution_rule, ExecutionRule::NonBlocking);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_skipped_duplicate_keeps_non_blocking_rule() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "e2e/checkout.synthetics.json",
        r#"{"tests": [
            {"id": "abc-def-ghi", "testOverrides": {"executionRule": "non_blocking"}},
            {"id": "abc-def-ghi", "testOverrides": {"executionRule": "skipped"}}
        ]}"#,
    );

    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(batch("failed", &[("abc-def-ghi", "failed")]));

    let config = config(&[]);
    let outcome = run_tests(&api, &config, dir.path()).await.unwrap();

    let summary = summary(&outcome);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.failed_non_blocking, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(api.triggered()[0].tests.len(), 1);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_echoed_execution_rule_wins() {
    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(
        serde_json::from_value(json!({
            "status": "failed",
            "results": [{
                "result_id": "r0",
                "test_public_id": "abc-def-ghi",
                "status": "failed",
                "location": "aws:eu-west-1",
                "execution_rule": "non_blocking",
                "retries": 2,
            }],
        }))
        .unwrap(),
    );

    let config = config(&["abc-def-ghi"]);
    let outcome = run(&api, &config).await;

    let summary = summary(&outcome);
    assert_eq!(summary.failed_non_blocking, 1);
    assert_eq!(summary.results[0].retries, Some(2));
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);
}

#[tokio::test]
async fn test_blocking_and_non_blocking_failures() {
    let mut api = MockApi::default();
    api.add_test(test("abc-def-ghi", None));
    api.add_test(test("jkl-mno-pqr", Some("non_blocking")));
    api.push_batch(batch("failed", &[("jkl-mno-pqr", "failed")]));

    let config = config(&["jkl-mno-pqr"]);
    let outcome = run(&api, &config).await;
    assert_eq!(summary(&outcome).failed_non_blocking, 1);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_OK);

    let api = MockApi::with_tests(&["abc-def-ghi"]);
    api.push_batch(batch("failed", &[("abc-def-ghi", "failed")]));
    let config = self::config(&["abc-def-ghi"]);
    let outcome = run(&api, &config).await;
    assert_eq!(summary(&outcome).failed, 1);
    assert_eq!(outcome.exit_code(Strictness::from(&config)), EXIT_FAILURE);
}

#[tokio::test]
async fn test_test_files_resolve_overrides() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "e2e/checkout.synthetics.json",
        r#"{"tests": [
            {"id": "abc-def-ghi", "testOverrides": {"locations": ["aws:us-east-1"], "retry": {"count": 2}}},
            {"id": "jkl-mno-pqr", "testOverrides": {"executionRule": "skipped"}}
        ]}"#,
    );

    let api = MockApi::with_tests(&["abc-def-ghi", "jkl-mno-pqr"]);
    api.push_batch(batch("passed", &[("abc-def-ghi", "passed")]));

    let mut config = config(&[]);
    config.default_test_overrides = OverrideSet {
        start_url: Some("https://staging.example.com".to_string()),
        retry: Some(RetryPolicy {
            count: Some(1),
            interval: Some(300),
        }),
        polling_timeout: Some(config.batch_timeout),
        ..Default::default()
    };

    let outcome = run_tests(&api, &config, dir.path()).await.unwrap();
    let summary = summary(&outcome);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.skipped, 1);

    let triggered = api.triggered();
    assert_eq!(triggered[0].tests.len(), 1);
    let payload = serde_json::to_value(&triggered[0].tests[0]).unwrap();
    assert_eq!(
        payload,
        json!({
            "public_id": "abc-def-ghi",
            "locations": ["aws:us-east-1"],
            "retry": {"count": 2, "interval": 300},
            "startUrl": "https://staging.example.com",
        })
    );
}

#[tokio::test]
async fn test_no_test_files_has_no_tests_to_run() {
    let api = MockApi::default();
    let outcome = run(&api, &config(&[])).await;
    assert_eq!(outcome, RunOutcome::NoTestsToRun);
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
