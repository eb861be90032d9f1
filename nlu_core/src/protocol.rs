//! Delimiter grammar the model is instructed to emit
//!
//! A completion is a run of records separated by [`RECORD_DELIMITER`]. Each
//! record is a list of fields separated by [`TUPLE_DELIMITER`], the first field
//! being a type tag such as `(entity`. [`COMPLETION_DELIMITER`] closes the
//! structured content.
//!
//! Two grammars share these delimiters. The entity-extraction grammar and the
//! intent-classification grammar give the `(language` record different shapes,
//! so the caller always picks one; nothing here guesses which grammar a
//! completion was written in.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{EntitySpan, IntentResult, LanguageResult, Meta};

pub const RECORD_DELIMITER: &str = "##";
pub const TUPLE_DELIMITER: &str = "<||>";
pub const COMPLETION_DELIMITER: &str = "<|COMPLETE|>";

pub const INTENT_TAG: &str = "(intent";
pub const LANGUAGE_TAG: &str = "(language";
pub const ENTITY_TAG: &str = "(entity";
pub const MISSING_TAG: &str = "(missing";

const ENTITY_FIELDS: usize = 6;
const MISSING_FIELDS: usize = 2;
const ENTITY_LANGUAGE_FIELDS: usize = 4;
const INTENT_FIELDS: usize = 5;
const INTENT_LANGUAGE_FIELDS: usize = 5;

/// Split raw completion text into records of fields.
///
/// Blank segments and the bare completion marker are skipped. A marker glued
/// to the end of the last record is stripped so the final field still parses.
pub fn split_records(raw: &str) -> impl Iterator<Item = Vec<&str>> + '_ {
    raw.split(RECORD_DELIMITER)
        .map(str::trim)
        .map(|segment| {
            segment
                .strip_suffix(COMPLETION_DELIMITER)
                .map(str::trim_end)
                .unwrap_or(segment)
        })
        .filter(|segment| !segment.is_empty() && *segment != COMPLETION_DELIMITER)
        .map(|segment| segment.split(TUPLE_DELIMITER).collect())
}

/// Record kinds of the entity-extraction grammar
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord<'a> {
    Entity(EntitySpan),
    Missing(String),
    Language(String),
    /// Known tag with fewer fields than its schema needs
    Truncated { tag: &'static str, fields: usize },
    /// Tag outside this grammar, kept so newer record kinds pass through harmlessly
    Unrecognized(&'a str),
}

/// Record kinds of the intent-classification grammar
#[derive(Debug, Clone, PartialEq)]
pub enum IntentRecord<'a> {
    Intent(IntentResult),
    Language(LanguageResult),
    Truncated { tag: &'static str, fields: usize },
    Unrecognized(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityTag {
    Entity,
    Missing,
    Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentTag {
    Intent,
    Language,
}

impl EntityTag {
    /// Entity grammar tags match by prefix, so `(entity)` and `(entity:` both count.
    fn classify(tag: &str) -> Option<Self> {
        if tag.starts_with(ENTITY_TAG) {
            Some(Self::Entity)
        } else if tag.starts_with(MISSING_TAG) {
            Some(Self::Missing)
        } else if tag.starts_with(LANGUAGE_TAG) {
            Some(Self::Language)
        } else {
            None
        }
    }
}

impl IntentTag {
    fn classify(tag: &str) -> Option<Self> {
        match tag {
            INTENT_TAG => Some(Self::Intent),
            LANGUAGE_TAG => Some(Self::Language),
            _ => None,
        }
    }
}

/// Decode one record's fields under the entity-extraction grammar
pub fn decode_entity_record<'a>(fields: &[&'a str]) -> EntityRecord<'a> {
    let tag = fields.first().copied().map(str::trim).unwrap_or_default();

    match EntityTag::classify(tag) {
        Some(EntityTag::Entity) if fields.len() >= ENTITY_FIELDS => {
            EntityRecord::Entity(EntitySpan::new(
                fields[1].trim().to_string(),
                fields[2].to_string(),
                lossy_int(fields[3]),
                lossy_int(fields[4]),
                lossy_float(fields[5]),
            ))
        }
        Some(EntityTag::Entity) => EntityRecord::Truncated {
            tag: ENTITY_TAG,
            fields: fields.len(),
        },
        Some(EntityTag::Missing) if fields.len() >= MISSING_FIELDS => {
            EntityRecord::Missing(fields[1].trim().to_string())
        }
        Some(EntityTag::Missing) => EntityRecord::Truncated {
            tag: MISSING_TAG,
            fields: fields.len(),
        },
        // Fields after the code are reserved; this grammar only reads the code.
        Some(EntityTag::Language) if fields.len() >= ENTITY_LANGUAGE_FIELDS => {
            EntityRecord::Language(fields[1].trim().to_string())
        }
        Some(EntityTag::Language) => EntityRecord::Truncated {
            tag: LANGUAGE_TAG,
            fields: fields.len(),
        },
        None => EntityRecord::Unrecognized(tag),
    }
}

/// Decode one record's fields under the intent-classification grammar
pub fn decode_intent_record<'a>(fields: &[&'a str]) -> IntentRecord<'a> {
    let tag = fields.first().copied().map(str::trim).unwrap_or_default();

    match IntentTag::classify(tag) {
        Some(IntentTag::Intent) if fields.len() >= INTENT_FIELDS => {
            IntentRecord::Intent(IntentResult {
                name: fields[1].trim().to_string(),
                confidence: lossy_float(fields[2]),
                priority: lossy_float(fields[3]),
                meta: lossy_meta(fields[4]),
            })
        }
        Some(IntentTag::Intent) => IntentRecord::Truncated {
            tag: INTENT_TAG,
            fields: fields.len(),
        },
        Some(IntentTag::Language) if fields.len() >= INTENT_LANGUAGE_FIELDS => {
            IntentRecord::Language(LanguageResult {
                code: fields[1].trim().to_string(),
                confidence: lossy_float(fields[2]),
                primary_flag: lossy_float(fields[3]) as i64,
                meta: lossy_meta(fields[4]),
            })
        }
        Some(IntentTag::Language) => IntentRecord::Truncated {
            tag: LANGUAGE_TAG,
            fields: fields.len(),
        },
        None => IntentRecord::Unrecognized(tag),
    }
}

/// Best-effort integer parse. Intentionally lossy: anything that is not a
/// plain integer becomes `0`.
pub fn lossy_int(field: &str) -> i64 {
    field.trim().parse().unwrap_or(0)
}

/// Best-effort float parse. Intentionally lossy: a leading number is kept even
/// when trailing junk follows it (`"0.9 (high)"` reads as `0.9`), and anything
/// without one, or any non-finite value, becomes `0.0`.
pub fn lossy_float(field: &str) -> f64 {
    static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();

    let field = field.trim();
    let value = field.parse::<f64>().ok().or_else(|| {
        let pattern = LEADING_NUMBER.get_or_init(|| {
            Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("Invalid regex pattern")
        });
        pattern.find(field).and_then(|m| m.as_str().parse().ok())
    });

    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Best-effort JSON object parse. Intentionally lossy: anything that is not a
/// JSON object yields an empty map.
pub fn lossy_meta(field: &str) -> Meta {
    serde_json::from_str(field.trim()).unwrap_or_default()
}
