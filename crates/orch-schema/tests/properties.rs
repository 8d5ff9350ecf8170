use orch_schema::{validate_intent, RawIntentCandidate, ValidationOutcome};
use proptest::prelude::*;
use serde_json::{Map, Value};
use uuid::Uuid;

proptest! {
    #[test]
    fn confidence_outside_unit_interval_is_always_invalid(confidence in -10.0f64..10.0f64) {
        let raw = RawIntentCandidate {
            intent_id: Uuid::new_v4().to_string(),
            conversation_id: "c".to_string(),
            message_id: "m".to_string(),
            action: "search".to_string(),
            parameters: Value::Object(Map::new()),
            confidence,
        };
        let outcome = validate_intent(&raw);
        prop_assert_eq!(outcome.is_valid(), (0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn any_non_closed_set_action_string_is_rejected(action in "[a-z]{1,12}") {
        prop_assume!(!matches!(action.as_str(), "search" | "calculate" | "summarize" | "translate"));
        let raw = RawIntentCandidate {
            intent_id: Uuid::new_v4().to_string(),
            conversation_id: "c".to_string(),
            message_id: "m".to_string(),
            action,
            parameters: Value::Object(Map::new()),
            confidence: 0.5,
        };
        match validate_intent(&raw) {
            ValidationOutcome::Invalid { error } => prop_assert!(error.contains("action")),
            ValidationOutcome::Valid(_) => prop_assert!(false, "unknown action must not validate"),
        }
    }
}
