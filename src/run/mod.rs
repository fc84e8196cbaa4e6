//! The `run-tests` workflow: selection, triggering, polling, and the exit code

mod discovery;
mod outcome;
mod report;
mod runner;
mod trigger;

pub use discovery::{discover_test_files, load_test_entries, load_test_file, TestEntry};
pub use outcome::{
    CriticalError, ExitReason, ResultOutcome, RunOutcome, Stage, Strictness, Summary, TestResult,
    EXIT_FAILURE, EXIT_OK,
};
pub use report::{print_outcome, result_url, write_json_report};
pub use runner::run_tests;
pub use trigger::{build_trigger_payload, TestTrigger};
