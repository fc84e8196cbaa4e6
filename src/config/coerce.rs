//! Primitive coercers
//!
//! Convert raw strings from environment variables and CLI flags into typed
//! values. Every coercer maps absent input (`None` or an empty string) to
//! `Ok(None)` so an unset variable never shadows a lower configuration layer.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::common::{Error, Result};

use super::overrides::ExecutionRule;

/// Separator for list-valued environment variables and override values
pub const LIST_DELIMITER: char = ';';

fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.is_empty())
}

/// Pass a string through, treating empty input as absent
pub fn to_string(raw: Option<&str>) -> Option<String> {
    present(raw).map(str::to_string)
}

/// Parse `true`/`1` and `false`/`0`, case-insensitively
pub fn to_bool(field: &str, raw: Option<&str>) -> Result<Option<bool>> {
    let Some(raw) = present(raw) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(Error::parse(field, raw, "expected true or false")),
    }
}

/// Parse a decimal number
pub fn to_number<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>> {
    let Some(raw) = present(raw) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::parse(field, raw, "expected a number"))
}

/// Parse one of `blocking`, `non_blocking`, `skipped`
pub fn to_execution_rule(field: &str, raw: Option<&str>) -> Result<Option<ExecutionRule>> {
    let Some(raw) = present(raw) else {
        return Ok(None);
    };
    raw.parse::<ExecutionRule>()
        .map(Some)
        .map_err(|reason| Error::parse(field, raw, reason))
}

/// Parse a JSON object whose values are all strings
pub fn to_string_map(field: &str, raw: Option<&str>) -> Result<Option<BTreeMap<String, String>>> {
    let Some(raw) = present(raw) else {
        return Ok(None);
    };
    serde_json::from_str::<BTreeMap<String, String>>(raw)
        .map(Some)
        .map_err(|e| Error::parse(field, raw, format!("expected a JSON object of strings ({e})")))
}

/// Split on `;` into trimmed, non-empty items
pub fn to_string_list(raw: Option<&str>) -> Option<Vec<String>> {
    present(raw).map(|raw| {
        raw.split(LIST_DELIMITER)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Parse a `KEY=VALUE` variable definition
///
/// Only the first `=` separates key from value, so values may contain `=`.
pub fn parse_variable(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::parse("variable", raw, "expected KEY=VALUE")),
    }
}
