//! Run orchestration
//!
//! Select tests, look them up, resolve their overrides, trigger one batch,
//! and poll it until it completes or the batch timeout elapses. Remote
//! errors never abort the run: they are logged and tallied in the
//! [`Summary`].

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::Instant;

use crate::api::{
    ApiError, Batch, BatchResult, ErrorKind, PolledResult, ResultStatus, SyntheticsApi,
};
use crate::common::Result;
use crate::config::{ExecutionRule, RunTestsConfig};

use super::discovery::{load_test_entries, TestEntry};
use super::outcome::{CriticalError, ResultOutcome, RunOutcome, Stage, Summary, TestResult};
use super::trigger::{build_trigger_payload, TestTrigger};

/// Log a remote error with enough context to diagnose it and build its tally entry
fn critical(stage: Stage, public_ids: Vec<String>, error: &ApiError) -> CriticalError {
    tracing::error!(
        stage = %stage,
        public_ids = %public_ids.join(","),
        endpoint = error.endpoint(),
        status = ?error.status(),
        body = error.body(),
        "{} failed: {}",
        stage,
        error.describe()
    );
    CriticalError::from_api(stage, public_ids, error)
}

/// Tests to run: search query, then public ids, then test definition files
async fn select_tests(
    api: &dyn SyntheticsApi,
    config: &RunTestsConfig,
    root: &Path,
    summary: &mut Summary,
) -> Result<Vec<TestEntry>> {
    if let Some(query) = &config.test_search_query {
        tracing::info!(query = %query, "Searching tests");
        return match api.search_tests(query).await {
            Ok(tests) => Ok(tests.into_iter().map(|t| TestEntry::from_id(t.public_id)).collect()),
            Err(e) => {
                summary.critical(critical(Stage::Search, Vec::new(), &e));
                Ok(Vec::new())
            }
        };
    }

    if !config.public_ids.is_empty() {
        return Ok(config.public_ids.iter().map(|id| TestEntry::from_id(id.clone())).collect());
    }

    load_test_entries(root, &config.files)
}

/// Look up every selected test and resolve its overrides
async fn lookup_tests(
    api: &dyn SyntheticsApi,
    config: &RunTestsConfig,
    entries: Vec<TestEntry>,
    summary: &mut Summary,
) -> Vec<TestTrigger> {
    let mut lookups: Vec<_> = stream::iter(entries.into_iter().enumerate())
        .map(|(index, entry)| async move {
            let result = api.get_test(&entry.id).await;
            (index, entry, result)
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;
    lookups.sort_by_key(|(index, _, _)| *index);

    let mut triggers = Vec::new();
    for (_, entry, result) in lookups {
        match result {
            Ok(test) => {
                tracing::debug!(public_id = %entry.id, name = %test.name, "Found test");
                triggers.push(TestTrigger::new(
                    test,
                    &config.default_test_overrides,
                    &entry.test_overrides,
                ));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(public_id = %entry.id, "Test not found");
                summary.missing(entry.id);
            }
            Err(e) => summary.critical(critical(Stage::Lookup, vec![entry.id], &e)),
        }
    }
    triggers
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Poll the batch until it is no longer in progress or the deadline passes.
///
/// At the deadline the last batch seen is returned as is; results still in
/// progress are classified as timed out.
async fn wait_for_batch(
    api: &dyn SyntheticsApi,
    config: &RunTestsConfig,
    batch_id: &str,
) -> std::result::Result<Batch, ApiError> {
    let deadline = Instant::now() + Duration::from_millis(config.batch_timeout);
    let interval = Duration::from_millis(config.polling_interval);
    let pb = spinner();

    let result = loop {
        let batch = match api.get_batch(batch_id).await {
            Ok(batch) => batch,
            Err(e) => break Err(e),
        };
        let finished = batch
            .results
            .iter()
            .filter(|r| r.status != ResultStatus::InProgress)
            .count();
        pb.set_message(format!("{}/{} results received", finished, batch.results.len()));

        if batch.status != ResultStatus::InProgress {
            break Ok(batch);
        }
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(batch_id, timeout_ms = config.batch_timeout, "Batch timed out");
            break Ok(batch);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    };

    pb.finish_and_clear();
    result
}

fn to_test_result(
    result: &BatchResult,
    rule: ExecutionRule,
    details: &HashMap<String, PolledResult>,
) -> TestResult {
    let failure = details
        .get(&result.result_id)
        .and_then(|polled| polled.result.as_ref())
        .and_then(|detail| detail.failure.clone());
    TestResult {
        public_id: result.test_public_id.clone(),
        result_id: result.result_id.clone(),
        location: result.location.clone(),
        outcome: ResultOutcome::classify(result, rule),
        execution_rule: rule,
        duration: result.duration,
        retries: result.retries,
        failure,
    }
}

/// A triggered test the batch never reported a result for
fn unreported_result(public_id: &str, rule: ExecutionRule) -> TestResult {
    tracing::warn!(public_id, "No result received before the batch ended");
    TestResult {
        public_id: public_id.to_string(),
        result_id: String::new(),
        location: String::new(),
        outcome: ResultOutcome::timed_out(rule),
        execution_rule: rule,
        duration: None,
        retries: None,
        failure: None,
    }
}

/// Run the selected tests and tally the outcome
pub async fn run_tests(
    api: &dyn SyntheticsApi,
    config: &RunTestsConfig,
    root: &Path,
) -> Result<RunOutcome> {
    let mut summary = Summary::default();

    let entries = select_tests(api, config, root, &mut summary).await?;
    if entries.is_empty() {
        if summary.critical_errors.is_empty() {
            tracing::info!("No tests to run");
            return Ok(RunOutcome::NoTestsToRun);
        }
        return Ok(RunOutcome::Completed(summary));
    }
    tracing::info!(count = entries.len(), "Selected tests");

    let triggers = lookup_tests(api, config, entries, &mut summary).await;
    let mut rules: HashMap<String, ExecutionRule> = HashMap::new();
    for trigger in &triggers {
        match trigger.execution_rule() {
            ExecutionRule::Skipped => {
                tracing::info!(public_id = trigger.public_id(), "Skipping test");
                summary.skipped += 1;
            }
            rule => {
                rules.entry(trigger.public_id().to_string()).or_insert(rule);
            }
        }
    }

    let payload = build_trigger_payload(&triggers);
    if payload.tests.is_empty() {
        return Ok(RunOutcome::Completed(summary));
    }
    let public_ids: Vec<String> = payload.tests.iter().map(|t| t.public_id.clone()).collect();

    let batch_id = match api.trigger_tests(&payload).await {
        Ok(response) => response.batch_id,
        Err(e) => {
            summary.critical(critical(Stage::Trigger, public_ids, &e));
            return Ok(RunOutcome::Completed(summary));
        }
    };
    tracing::info!(batch_id = %batch_id, count = public_ids.len(), "Triggered tests");
    summary.batch_id = Some(batch_id.clone());

    let batch = match wait_for_batch(api, config, &batch_id).await {
        Ok(batch) => batch,
        Err(e) => {
            summary.critical(critical(Stage::Batch, public_ids, &e));
            return Ok(RunOutcome::Completed(summary));
        }
    };

    let finished: Vec<String> = batch
        .results
        .iter()
        .filter(|r| !matches!(r.status, ResultStatus::InProgress | ResultStatus::Skipped))
        .map(|r| r.result_id.clone())
        .collect();
    let mut details = HashMap::new();
    if !finished.is_empty() {
        match api.poll_results(&finished).await {
            Ok(polled) => {
                details.extend(polled.into_iter().map(|p| (p.result_id.clone(), p)));
            }
            Err(e) => summary.critical(critical(Stage::Results, public_ids.clone(), &e)),
        }
    }

    let mut reported = HashSet::new();
    for result in &batch.results {
        let rule = result
            .execution_rule
            .or_else(|| rules.get(&result.test_public_id).copied())
            .unwrap_or_default();
        reported.insert(result.test_public_id.as_str());
        summary.record(to_test_result(result, rule, &details));
    }

    for public_id in &public_ids {
        if reported.insert(public_id.as_str()) {
            let rule = rules.get(public_id).copied().unwrap_or_default();
            summary.record(unreported_result(public_id, rule));
        }
    }

    Ok(RunOutcome::Completed(summary))
}
