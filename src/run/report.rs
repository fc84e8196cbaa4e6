//! Console and JSON reporting of a run

use std::path::Path;

use colored::Colorize;

use crate::common::{Error, Result};
use crate::config::RunTestsConfig;

use super::outcome::{ResultOutcome, RunOutcome, Strictness, Summary, TestResult};

/// Link to one result in the web app
pub fn result_url(config: &RunTestsConfig, public_id: &str, result_id: &str) -> String {
    format!(
        "https://{}.{}/synthetics/details/{}/result/{}",
        config.subdomain, config.datadog_site, public_id, result_id
    )
}

fn outcome_marker(outcome: ResultOutcome) -> String {
    match outcome {
        ResultOutcome::Passed => "✓".green().to_string(),
        ResultOutcome::Failed => "✗".red().to_string(),
        ResultOutcome::FailedNonBlocking => "✗".yellow().to_string(),
        ResultOutcome::Skipped => "-".dimmed().to_string(),
        ResultOutcome::TimedOut => "⏱".red().to_string(),
    }
}

fn result_line(result: &TestResult) -> String {
    let mut line = format!(
        "  {} {}",
        outcome_marker(result.outcome),
        result.public_id.white().bold()
    );
    if !result.location.is_empty() {
        line.push_str(&format!(" {}", format!("[{}]", result.location).dimmed()));
    }
    if let Some(duration) = result.duration {
        line.push_str(&format!(" {}", format!("{}ms", duration).dimmed()));
    }
    match result.retries {
        Some(1) => line.push_str(&format!(" {}", "(1 retry)".dimmed())),
        Some(n) if n > 1 => line.push_str(&format!(" {}", format!("({} retries)", n).dimmed())),
        _ => {}
    }
    match result.outcome {
        ResultOutcome::FailedNonBlocking => {
            line.push_str(&format!(" {}", "(non-blocking)".yellow()));
        }
        ResultOutcome::TimedOut => line.push_str(&format!(" {}", "(timed out)".red())),
        _ => {}
    }
    line
}

fn print_result(config: &RunTestsConfig, result: &TestResult) {
    println!("{}", result_line(result));

    if let Some(failure) = &result.failure {
        println!("    {} {}", failure.code.red(), failure.message);
    }
    if result.outcome != ResultOutcome::Skipped && !result.result_id.is_empty() {
        println!(
            "    {}",
            result_url(config, &result.public_id, &result.result_id).dimmed()
        );
    }
}

fn print_summary(config: &RunTestsConfig, summary: &Summary, strictness: Strictness) {
    if !summary.results.is_empty() {
        println!("\n{}", "Results:".cyan());
        for result in &summary.results {
            print_result(config, result);
        }
    }

    if !summary.tests_not_found.is_empty() {
        println!("\n{}", "Tests not found:".yellow());
        for public_id in &summary.tests_not_found {
            println!("  {} {}", "?".yellow(), public_id);
        }
    }

    if !summary.critical_errors.is_empty() {
        println!("\n{}", "Critical errors:".red());
        for error in &summary.critical_errors {
            println!("  {} {}", "✗".red(), error);
            if let Some(hint) = &error.hint {
                println!("    {}", hint.dimmed());
            }
        }
    }

    println!(
        "\n{} {} passed, {} failed, {} failed (non-blocking), {} skipped, {} timed out, {} not found, {} critical",
        "Summary:".blue().bold(),
        summary.passed.to_string().green(),
        summary.failed.to_string().red(),
        summary.failed_non_blocking,
        summary.skipped,
        summary.timed_out,
        summary.tests_not_found.len(),
        summary.critical_errors.len()
    );
    if let Some(batch_id) = &summary.batch_id {
        println!("  Batch: {}", batch_id.dimmed());
    }

    let reasons = summary.exit_reasons(strictness);
    if reasons.is_empty() {
        println!("\n{} {}", "✓".green().bold(), "Run passed".green().bold());
    } else {
        for reason in reasons {
            println!("{} {}", "✗".red().bold(), reason);
        }
    }
}

/// Print the outcome of a run to stdout
pub fn print_outcome(config: &RunTestsConfig, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::NoTestsToRun => {
            println!("{}", "No tests to run.".yellow());
        }
        RunOutcome::Completed(summary) => {
            print_summary(config, summary, Strictness::from(config));
        }
    }
}

/// Write the run summary as JSON
pub fn write_json_report(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let empty = Summary::default();
    let summary = outcome.summary().unwrap_or(&empty);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).map_err(|e| {
        Error::Internal(format!("Failed to write JSON report '{}': {}", path.display(), e))
    })?;
    tracing::info!(path = %path.display(), "Wrote JSON report");
    Ok(())
}
