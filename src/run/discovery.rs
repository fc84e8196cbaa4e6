//! Test definition files
//!
//! A test definition file lists the tests to run and each test's own
//! override block:
//!
//! ```json
//! {"tests": [{"id": "abc-def-ghi", "testOverrides": {"startUrl": "..."}}]}
//! ```

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use walkdir::{DirEntry, WalkDir};

use crate::common::{Error, Result};
use crate::config::OverrideSet;

/// Directories never searched for test files
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

/// One test selected for the run, with its own overrides
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestEntry {
    pub id: String,
    /// `config` is the deprecated name of this block
    #[serde(default, alias = "config")]
    pub test_overrides: OverrideSet,
}

impl TestEntry {
    /// Entry for a test selected by public id, without overrides of its own
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            test_overrides: OverrideSet::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TestFile {
    #[serde(default)]
    tests: Vec<TestEntry>,
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("Invalid files pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("Invalid files patterns: {}", e)))
}

fn is_searched_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
}

/// Find files under `root` matching any of the glob patterns, sorted by path
pub fn discover_test_files(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let glob_set = build_glob_set(patterns)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(is_searched_dir) {
        let entry = entry.map_err(|e| Error::Internal(format!("Failed to walk directory: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if glob_set.is_match(relative) {
            files.push(entry.into_path());
        }
    }
    files.sort();

    tracing::debug!(count = files.len(), "Discovered test files");
    Ok(files)
}

/// Read the test entries of one test definition file
pub fn load_test_file(path: &Path) -> Result<Vec<TestEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let file: TestFile = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Invalid test file '{}': {}", path.display(), e))
    })?;
    Ok(file.tests)
}

/// Discover and read every test definition file
pub fn load_test_entries(root: &Path, patterns: &[String]) -> Result<Vec<TestEntry>> {
    let mut entries = Vec::new();
    for path in discover_test_files(root, patterns)? {
        entries.extend(load_test_file(&path)?);
    }
    Ok(entries)
}
