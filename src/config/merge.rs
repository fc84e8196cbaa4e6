//! Field-level merge primitives
//!
//! Layers are merged through the [`Merge`] trait, implemented by hand on each
//! configuration struct with an explicit field list:
//! - Scalars and lists: overlay replaces when present
//! - Nested records (`retry`, `basicAuth`, ...): merged sub-field by sub-field
//! - String maps (`headers`, `variables`): merged key by key
//!
//! An absent (`None`) overlay field never touches the base.

use std::collections::BTreeMap;

/// Merge a higher-precedence layer onto `self`
pub trait Merge {
    fn merge(&mut self, overlay: Self);
}

impl Merge for BTreeMap<String, String> {
    fn merge(&mut self, overlay: Self) {
        self.extend(overlay);
    }
}

/// Replace the slot when the overlay is present
pub fn replace<T>(slot: &mut Option<T>, overlay: Option<T>) {
    if let Some(value) = overlay {
        *slot = Some(value);
    }
}

/// Recursively merge the slot with the overlay when both are present
pub fn nested<T: Merge>(slot: &mut Option<T>, overlay: Option<T>) {
    let Some(overlay) = overlay else {
        return;
    };
    match slot {
        Some(base) => base.merge(overlay),
        None => *slot = Some(overlay),
    }
}
