//! Core data types for parsed model output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key-value metadata attached to intent and language records.
///
/// The schema is chosen by whoever writes the prompt, so values stay dynamically typed.
pub type Meta = Map<String, Value>;

/// One extracted slot value and the span the model claims it came from.
///
/// Offsets and confidence are copied verbatim from the completion. They are not
/// checked against the user message length, and `start <= end` is not enforced,
/// so anything that highlights text from these offsets must clamp them itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub raw: String,
    pub start: i64,
    pub end: i64,
    pub confidence: f64,
}

/// One classified intent candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub name: String,
    pub confidence: f64,
    #[serde(rename = "priority_score")]
    pub priority: f64,
    pub meta: Meta,
}

/// One detected language (ISO 639-3 code)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageResult {
    pub code: String,
    pub confidence: f64,
    pub primary_flag: i64,
    pub meta: Meta,
}

/// Result of parsing a completion in entity-extraction mode.
///
/// `missing` is what the model itself declared absent. It is advisory; use
/// [`EntityOutput::missing_keys`] for the value business logic should act on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityOutput {
    pub entities: Vec<EntitySpan>,
    pub missing: Vec<String>,
    pub language: String,
}

/// Result of parsing a completion in intent-classification mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentOutput {
    pub intents: Vec<IntentResult>,
    pub languages: Vec<LanguageResult>,
}

impl EntitySpan {
    pub fn new(
        entity_type: String,
        raw: String,
        start: i64,
        end: i64,
        confidence: f64,
    ) -> Self {
        Self {
            entity_type,
            raw,
            start,
            end,
            confidence,
        }
    }
}

impl EntityOutput {
    /// Entities of the given type in parse order. Empty when none match.
    pub fn entities_by_type(&self, entity_type: &str) -> Vec<&EntitySpan> {
        crate::slots::entities_by_type(&self.entities, entity_type)
    }

    /// Required keys not yet satisfied by any entity in this output
    pub fn missing_keys<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        crate::slots::missing_keys(&self.entities, required)
    }

    /// True when the model produced no structured entity data at all
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.missing.is_empty() && self.language.is_empty()
    }
}

impl IntentOutput {
    /// Highest-confidence intent, first seen wins on ties
    pub fn top_intent(&self) -> Option<&IntentResult> {
        self.intents.iter().fold(None, |best: Option<&IntentResult>, candidate| match best {
            Some(b) if b.confidence >= candidate.confidence => Some(b),
            _ => Some(candidate),
        })
    }

    /// Language flagged as primary, falling back to the first one reported
    pub fn primary_language(&self) -> Option<&LanguageResult> {
        self.languages
            .iter()
            .find(|l| l.primary_flag == 1)
            .or_else(|| self.languages.first())
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.languages.is_empty()
    }
}
