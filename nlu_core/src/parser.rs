//! Entry points that turn a raw completion into typed output
//!
//! Parsing never fails. Records that are truncated or carry an unknown tag are
//! dropped and parsing carries on with the next one, so a noisy completion
//! still yields whatever structure it does contain.

use serde::Serialize;
use tracing::{debug, trace};

use crate::protocol::{decode_entity_record, decode_intent_record, split_records, EntityRecord, IntentRecord};
use crate::types::{EntityOutput, IntentOutput};

/// Counters describing what a parse call kept and what it threw away
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub records_seen: usize,
    pub records_accepted: usize,
    pub records_dropped: usize,
    pub unknown_tags: Vec<String>,
}

impl ParseReport {
    fn accept(&mut self) {
        self.records_seen += 1;
        self.records_accepted += 1;
    }

    fn drop_truncated(&mut self, tag: &str, fields: usize) {
        debug!(tag, fields, "dropping truncated record");
        self.records_seen += 1;
        self.records_dropped += 1;
    }

    fn drop_unknown(&mut self, tag: &str) {
        debug!(tag, "dropping record with unknown tag");
        self.records_seen += 1;
        self.records_dropped += 1;
        self.unknown_tags.push(tag.to_string());
    }
}

/// Parse a completion written in the entity-extraction grammar
pub fn parse_entity_output(raw: &str) -> EntityOutput {
    parse_entity_output_with_report(raw).0
}

/// Parse a completion written in the intent-classification grammar
pub fn parse_intent_output(raw: &str) -> IntentOutput {
    parse_intent_output_with_report(raw).0
}

/// Like [`parse_entity_output`], also returning drop diagnostics.
///
/// When several `(language` records appear the last one wins.
pub fn parse_entity_output_with_report(raw: &str) -> (EntityOutput, ParseReport) {
    let mut output = EntityOutput::default();
    let mut report = ParseReport::default();

    for fields in split_records(raw) {
        match decode_entity_record(&fields) {
            EntityRecord::Entity(span) => {
                trace!(entity_type = %span.entity_type, confidence = span.confidence, "entity record");
                output.entities.push(span);
                report.accept();
            }
            EntityRecord::Missing(key) => {
                output.missing.push(key);
                report.accept();
            }
            EntityRecord::Language(code) => {
                output.language = code;
                report.accept();
            }
            EntityRecord::Truncated { tag, fields } => report.drop_truncated(tag, fields),
            EntityRecord::Unrecognized(tag) => report.drop_unknown(tag),
        }
    }

    (output, report)
}

/// Like [`parse_intent_output`], also returning drop diagnostics
pub fn parse_intent_output_with_report(raw: &str) -> (IntentOutput, ParseReport) {
    let mut output = IntentOutput::default();
    let mut report = ParseReport::default();

    for fields in split_records(raw) {
        match decode_intent_record(&fields) {
            IntentRecord::Intent(intent) => {
                trace!(name = %intent.name, confidence = intent.confidence, "intent record");
                output.intents.push(intent);
                report.accept();
            }
            IntentRecord::Language(language) => {
                output.languages.push(language);
                report.accept();
            }
            IntentRecord::Truncated { tag, fields } => report.drop_truncated(tag, fields),
            IntentRecord::Unrecognized(tag) => report.drop_unknown(tag),
        }
    }

    (output, report)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::protocol::{
        COMPLETION_DELIMITER, ENTITY_TAG, INTENT_TAG, LANGUAGE_TAG, MISSING_TAG, RECORD_DELIMITER,
        TUPLE_DELIMITER,
    };
    use proptest::prelude::*;

    // -- Strategy helpers --

    fn arb_token() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(RECORD_DELIMITER.to_string()),
            Just(TUPLE_DELIMITER.to_string()),
            Just(COMPLETION_DELIMITER.to_string()),
            Just(ENTITY_TAG.to_string()),
            Just(MISSING_TAG.to_string()),
            Just(LANGUAGE_TAG.to_string()),
            Just(INTENT_TAG.to_string()),
            // Partial delimiters
            Just("#".to_string()),
            Just("<|".to_string()),
            Just("|>".to_string()),
            Just("{\"k\":".to_string()),
            "[0-9.eE+-]{0,6}",
            "[a-z_ ]{0,8}",
            ".{0,6}",
        ]
    }

    fn arb_completion() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_token(), 0..48).prop_map(|tokens| tokens.concat())
    }

    proptest! {
        #[test]
        fn parsers_accept_any_completion(raw in arb_completion()) {
            let (_, entity_report) = parse_entity_output_with_report(&raw);
            let (_, intent_report) = parse_intent_output_with_report(&raw);

            prop_assert_eq!(
                entity_report.records_seen,
                entity_report.records_accepted + entity_report.records_dropped
            );
            prop_assert_eq!(
                intent_report.records_seen,
                intent_report.records_accepted + intent_report.records_dropped
            );
        }

        #[test]
        fn parsing_twice_gives_equal_output(raw in arb_completion()) {
            prop_assert_eq!(parse_entity_output(&raw), parse_entity_output(&raw));
            prop_assert_eq!(parse_intent_output(&raw), parse_intent_output(&raw));
        }

        #[test]
        fn parsed_numbers_are_finite(raw in arb_completion()) {
            let entities = parse_entity_output(&raw);
            prop_assert!(entities.entities.iter().all(|e| e.confidence.is_finite()));

            let intents = parse_intent_output(&raw);
            prop_assert!(intents.intents.iter().all(|i| i.confidence.is_finite() && i.priority.is_finite()));
            prop_assert!(intents.languages.iter().all(|l| l.confidence.is_finite()));
        }
    }
}
