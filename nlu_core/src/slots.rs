//! Slot-filling validation
//!
//! Decides which required slots are still open after an extraction pass. This
//! computed list is the one to act on; the model's own `(missing` records are
//! only a hint.

use ahash::AHashSet;

use crate::types::EntitySpan;

/// An entity fills its slot only when confidence is strictly above this.
pub const SATISFY_THRESHOLD: f64 = 0.5;

/// Whether an entity counts as having filled its slot
pub fn satisfies(entity: &EntitySpan) -> bool {
    entity.confidence > SATISFY_THRESHOLD && entity.start >= 0
}

/// Required keys with no satisfying entity of that exact type.
///
/// Keeps the order of `required`.
pub fn missing_keys<S: AsRef<str>>(entities: &[EntitySpan], required: &[S]) -> Vec<String> {
    let filled: AHashSet<&str> = entities
        .iter()
        .filter(|e| satisfies(e))
        .map(|e| e.entity_type.as_str())
        .collect();

    required
        .iter()
        .map(|key| key.as_ref())
        .filter(|key| !filled.contains(key))
        .map(str::to_string)
        .collect()
}

/// Entities of one type in parse order
pub fn entities_by_type<'a>(entities: &'a [EntitySpan], entity_type: &str) -> Vec<&'a EntitySpan> {
    entities
        .iter()
        .filter(|e| e.entity_type == entity_type)
        .collect()
}

/// Keys the model reported missing that the validator considers filled.
///
/// Useful for spotting a model that contradicts its own extractions. The
/// reported list never replaces [`missing_keys`].
pub fn self_report_conflicts<'a>(entities: &[EntitySpan], reported: &'a [String]) -> Vec<&'a str> {
    reported
        .iter()
        .map(String::as_str)
        .filter(|key| entities.iter().any(|e| e.entity_type == *key && satisfies(e)))
        .collect()
}
