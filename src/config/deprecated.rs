//! Deprecated field reconciliation
//!
//! Each deprecated field is declared once as a [`Deprecated`] pair (the old
//! field, the field that replaced it, and how the two are synchronized).
//! Values are computed from the raw layers, then written onto the merged
//! configuration in a single step.

use std::collections::BTreeMap;

use super::command::{PartialRunTestsConfig, RunTestsConfig};
use super::overrides::OverrideSet;

/// How a deprecated field is reconciled with its replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRule {
    /// The deprecated value is moved into the current field
    Fold,
    /// Both fields keep the same value after resolution
    Mirror,
}

/// A deprecated field and the field that replaced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deprecated {
    VariableStrings,
    Locations,
    PollingTimeout,
}

impl Deprecated {
    pub const ALL: [Deprecated; 3] = [
        Deprecated::VariableStrings,
        Deprecated::Locations,
        Deprecated::PollingTimeout,
    ];

    pub fn deprecated_field(self) -> &'static str {
        match self {
            Self::VariableStrings => "variableStrings",
            Self::Locations => "locations",
            Self::PollingTimeout => "pollingTimeout",
        }
    }

    pub fn current_field(self) -> &'static str {
        match self {
            Self::VariableStrings => "defaultTestOverrides.variables",
            Self::Locations => "defaultTestOverrides.locations",
            Self::PollingTimeout => "batchTimeout",
        }
    }

    pub fn rule(self) -> SyncRule {
        match self {
            Self::VariableStrings | Self::Locations => SyncRule::Fold,
            Self::PollingTimeout => SyncRule::Mirror,
        }
    }

    /// Whether this layer sets the deprecated side of the pair
    fn set_in(self, layer: &PartialRunTestsConfig) -> bool {
        match self {
            Self::VariableStrings => layer.variable_strings.is_some(),
            Self::Locations => deprecated_locations(layer).is_some(),
            Self::PollingTimeout => deprecated_polling_timeout(layer).is_some(),
        }
    }

    /// Reconciled value of this pair, `None` when the regular merge already holds it
    fn resolve(self, base: &RunTestsConfig, layers: &[&PartialRunTestsConfig]) -> Option<Value> {
        match self {
            Self::VariableStrings => fold_variables(base, layers).map(Value::Variables),
            Self::Locations => fold_locations(layers).map(Value::Locations),
            Self::PollingTimeout => Some(Value::Timeout(mirror_polling_timeout(base, layers))),
        }
    }
}

fn overrides(layer: &PartialRunTestsConfig) -> Option<&OverrideSet> {
    layer.default_test_overrides.as_ref()
}

fn deprecated_locations(layer: &PartialRunTestsConfig) -> Option<&Vec<String>> {
    layer
        .global
        .as_ref()
        .and_then(|g| g.locations.as_ref())
        .or(layer.locations.as_ref())
}

fn deprecated_polling_timeout(layer: &PartialRunTestsConfig) -> Option<u64> {
    overrides(layer)
        .and_then(|o| o.polling_timeout)
        .or_else(|| layer.global.as_ref().and_then(|g| g.polling_timeout))
}

/// A reconciled value, in the type of the current field
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Variables(BTreeMap<String, String>),
    Locations(Vec<String>),
    Timeout(u64),
}

fn write_current(config: &mut RunTestsConfig, value: &Value) {
    match value {
        Value::Variables(variables) => {
            config.default_test_overrides.variables = Some(variables.clone())
        }
        Value::Locations(locations) => {
            config.default_test_overrides.locations = Some(locations.clone())
        }
        Value::Timeout(timeout) => config.batch_timeout = *timeout,
    }
}

fn write_deprecated(config: &mut RunTestsConfig, value: &Value) {
    match value {
        Value::Timeout(timeout) => {
            config.default_test_overrides.polling_timeout = Some(*timeout);
            config.global.polling_timeout = Some(*timeout);
        }
        Value::Variables(_) | Value::Locations(_) => {}
    }
}

/// Values computed from the layers, ready to be written onto the merged config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    values: Vec<(Deprecated, Value)>,
}

impl Reconciled {
    /// Compute reconciled values. `layers` are ordered lowest to highest precedence.
    pub fn compute(base: &RunTestsConfig, layers: &[&PartialRunTestsConfig]) -> Self {
        let mut values = Vec::new();
        for pair in Deprecated::ALL {
            if layers.iter().any(|layer| pair.set_in(layer)) {
                tracing::warn!(
                    "'{}' is deprecated, use '{}' instead",
                    pair.deprecated_field(),
                    pair.current_field()
                );
            }
            if let Some(value) = pair.resolve(base, layers) {
                values.push((pair, value));
            }
        }
        Self { values }
    }

    /// Write the reconciled values onto the merged configuration.
    ///
    /// Folded pairs only fill the current field; mirrored pairs fill both.
    pub fn write(self, config: &mut RunTestsConfig) {
        // `global` survives resolution only as the mirror of `batchTimeout`
        config.global = OverrideSet::default();
        for (pair, value) in &self.values {
            write_current(config, value);
            if pair.rule() == SyncRule::Mirror {
                write_deprecated(config, value);
            }
        }
    }
}

/// Replay every layer's variables, `variableStrings` first so the explicit
/// map of the same layer wins. Returns `None` when no layer uses
/// `variableStrings`, since the regular merge already produced the result.
fn fold_variables(
    base: &RunTestsConfig,
    layers: &[&PartialRunTestsConfig],
) -> Option<BTreeMap<String, String>> {
    if !layers
        .iter()
        .any(|layer| Deprecated::VariableStrings.set_in(layer))
    {
        return None;
    }

    let mut variables = base
        .default_test_overrides
        .variables
        .clone()
        .unwrap_or_default();
    for layer in layers {
        if let Some(strings) = &layer.variable_strings {
            variables.extend(strings.iter().map(|v| (v.key.clone(), v.value.clone())));
        }
        for set in [layer.global.as_ref(), overrides(layer)].into_iter().flatten() {
            if let Some(explicit) = &set.variables {
                variables.extend(explicit.clone());
            }
        }
    }
    Some(variables)
}

/// The highest layer setting either field decides; inside one layer the
/// current field wins.
fn fold_locations(layers: &[&PartialRunTestsConfig]) -> Option<Vec<String>> {
    layers.iter().rev().find_map(|layer| {
        overrides(layer)
            .and_then(|o| o.locations.clone())
            .or_else(|| deprecated_locations(layer).cloned())
    })
}

/// The highest layer setting either field decides; inside one layer
/// `batchTimeout` wins. Falls back to the base value.
fn mirror_polling_timeout(base: &RunTestsConfig, layers: &[&PartialRunTestsConfig]) -> u64 {
    layers
        .iter()
        .rev()
        .find_map(|layer| layer.batch_timeout.or_else(|| deprecated_polling_timeout(layer)))
        .unwrap_or(base.batch_timeout)
}
