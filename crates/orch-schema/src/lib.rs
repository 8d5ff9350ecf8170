#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-schema** – Structural validator for reasoning-intent candidates
//! (spec §4.6).
//!
//! `validate_intent` is the sole authority on whether a candidate produced by
//! a reasoning function may cross the boundary into execution. It is pure and
//! total: every input, however malformed, yields a [`ValidationOutcome`]
//! rather than a panic or an `Err`.

use orch_types::Action;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

/// The unvalidated shape a reasoning function hands back. Every field is
/// loosely typed (`String`/`Value`) on purpose: validation, not
/// deserialization, is what's supposed to reject a malformed candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIntentCandidate {
    /// Candidate intent identifier, expected to parse as a UUID.
    #[serde(rename = "intentId")]
    pub intent_id: String,
    /// Owning conversation id, expected non-empty.
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    /// Originating message id, expected non-empty.
    #[serde(rename = "messageId")]
    pub message_id: String,
    /// Requested action; must be one of the closed set to validate.
    pub action: String,
    /// Free-form parameters; must be a JSON object to validate.
    pub parameters: Value,
    /// Self-reported confidence; must lie in `[0, 1]` to validate.
    pub confidence: f64,
}

/// A candidate that passed every structural check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIntentData {
    /// Parsed intent id.
    pub intent_id: Uuid,
    /// Conversation id, carried through unparsed (the store assigns meaning).
    pub conversation_id: String,
    /// Message id, carried through unparsed.
    pub message_id: String,
    /// Parsed, closed-set action.
    pub action: Action,
    /// Parameter map, unwrapped from the `Value` envelope.
    pub parameters: Map<String, Value>,
    /// Confidence, already known to lie in `[0, 1]`.
    pub confidence: f64,
}

/// Result of [`validate_intent`]: never an `Err` — malformed input is a
/// first-class value, per spec §4.6 ("It does not throw").
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The candidate satisfies every structural rule.
    Valid(ValidatedIntentData),
    /// The candidate violates one or more rules; `error` summarizes all of
    /// them, not just the first encountered.
    Invalid {
        /// Human-readable, newline-joined summary of every violated path.
        error: String,
    },
}

impl ValidationOutcome {
    /// `true` iff this is the [`ValidationOutcome::Valid`] variant.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }
}

/// Validate a reasoning candidate against the intent schema (spec §4.4 step
/// 4): `intentId` parses as a UUID; `conversationId`/`messageId` are
/// non-empty; `action` is one of `search|calculate|summarize|translate`;
/// `parameters` is a JSON object; `confidence` lies in `[0, 1]`.
pub fn validate_intent(raw: &RawIntentCandidate) -> ValidationOutcome {
    let mut violations = Vec::new();

    let intent_id = Uuid::from_str(&raw.intent_id).ok();
    if intent_id.is_none() {
        violations.push(format!("intentId: {:?} is not a valid UUID", raw.intent_id));
    }

    if raw.conversation_id.trim().is_empty() {
        violations.push("conversationId: must not be empty".to_string());
    }

    if raw.message_id.trim().is_empty() {
        violations.push("messageId: must not be empty".to_string());
    }

    let action = Action::from_str(&raw.action);
    if let Err(ref unknown) = action {
        violations.push(format!("action: {unknown}"));
    }

    let parameters = raw.parameters.as_object();
    if parameters.is_none() {
        violations.push(format!(
            "parameters: expected a JSON object, got {}",
            value_kind(&raw.parameters)
        ));
    }

    if !(0.0..=1.0).contains(&raw.confidence) {
        violations.push(format!(
            "confidence: {} is not within [0, 1]",
            raw.confidence
        ));
    }

    if violations.is_empty() {
        ValidationOutcome::Valid(ValidatedIntentData {
            intent_id: intent_id.expect("checked above"),
            conversation_id: raw.conversation_id.clone(),
            message_id: raw.message_id.clone(),
            action: action.expect("checked above"),
            parameters: parameters.expect("checked above").clone(),
            confidence: raw.confidence,
        })
    } else {
        ValidationOutcome::Invalid {
            error: violations.join("; "),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_candidate() -> RawIntentCandidate {
        RawIntentCandidate {
            intent_id: Uuid::new_v4().to_string(),
            conversation_id: "conv-1".to_string(),
            message_id: "msg-1".to_string(),
            action: "search".to_string(),
            parameters: Value::Object(Map::new()),
            confidence: 0.8,
        }
    }

    #[test]
    fn accepts_a_well_formed_candidate() {
        let outcome = validate_intent(&valid_candidate());
        assert!(outcome.is_valid());
    }

    #[test]
    fn rejects_a_malformed_intent_id() {
        let mut raw = valid_candidate();
        raw.intent_id = "not-a-uuid".to_string();
        let outcome = validate_intent(&raw);
        match outcome {
            ValidationOutcome::Invalid { error } => assert!(error.contains("intentId")),
            _ => panic!("expected Invalid"),
        }
    }

    #[test]
    fn rejects_empty_conversation_id() {
        let mut raw = valid_candidate();
        raw.conversation_id = "   ".to_string();
        let outcome = validate_intent(&raw);
        match outcome {
            ValidationOutcome::Invalid { error } => assert!(error.contains("conversationId")),
            _ => panic!("expected Invalid"),
        }
    }

    #[test]
    fn rejects_unknown_action() {
        let mut raw = valid_candidate();
        raw.action = "dance".to_string();
        let outcome = validate_intent(&raw);
        match outcome {
            ValidationOutcome::Invalid { error } => assert!(error.contains("action")),
            _ => panic!("expected Invalid"),
        }
    }

    #[test]
    fn rejects_non_object_parameters() {
        let mut raw = valid_candidate();
        raw.parameters = Value::String("nope".to_string());
        let outcome = validate_intent(&raw);
        match outcome {
            ValidationOutcome::Invalid { error } => assert!(error.contains("parameters")),
            _ => panic!("expected Invalid"),
        }
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        for bad in [-0.1, 1.1, f64::NAN] {
            let mut raw = valid_candidate();
            raw.confidence = bad;
            let outcome = validate_intent(&raw);
            assert!(!outcome.is_valid(), "confidence {bad} should be rejected");
        }
    }

    #[test]
    fn accumulates_every_violation_not_just_the_first() {
        let raw = RawIntentCandidate {
            intent_id: "bad".to_string(),
            conversation_id: "".to_string(),
            message_id: "".to_string(),
            action: "dance".to_string(),
            parameters: Value::Null,
            confidence: 5.0,
        };
        match validate_intent(&raw) {
            ValidationOutcome::Invalid { error } => {
                for needle in ["intentId", "conversationId", "messageId", "action", "parameters", "confidence"] {
                    assert!(error.contains(needle), "missing {needle} in {error:?}");
                }
            }
            _ => panic!("expected Invalid"),
        }
    }
}
