use std::str::FromStr;

use chrono::Utc;
use orch_types::{Action, ConversationId, ConversationState, IntentId, MessageId, ReasoningIntent};
use serde_json::Map;

#[test]
fn action_from_str_accepts_the_closed_set() {
    for action in Action::ALL {
        assert_eq!(Action::from_str(action.as_str()).unwrap(), action);
    }
}

#[test]
fn action_from_str_rejects_unknown_actions() {
    assert!(Action::from_str("dance").is_err());
}

#[test]
fn conversation_state_terminal_classification() {
    assert!(ConversationState::ActionCompleted.is_terminal());
    assert!(ConversationState::FailedValidation.is_terminal());
    assert!(ConversationState::FailedExecution.is_terminal());
    assert!(!ConversationState::Received.is_terminal());
    assert!(!ConversationState::ReasoningRequested.is_terminal());
    assert!(!ConversationState::IntentValidated.is_terminal());
    assert!(!ConversationState::ActionRequested.is_terminal());
}

#[test]
fn valid_intent_has_no_validation_error() {
    let intent = ReasoningIntent::valid(
        IntentId::new(),
        ConversationId::new(),
        MessageId::new(),
        "search".to_string(),
        Map::new(),
        0.5,
        Utc::now(),
    );
    assert!(intent.valid);
    assert!(intent.validation_error.is_none());
    assert!(intent.invariant_holds());
}

#[test]
fn invalid_intent_carries_its_error() {
    let intent = ReasoningIntent::invalid(
        IntentId::new(),
        ConversationId::new(),
        MessageId::new(),
        "dance".to_string(),
        Map::new(),
        0.5,
        Utc::now(),
        "action must be one of search|calculate|summarize|translate".to_string(),
    );
    assert!(!intent.valid);
    assert!(intent.validation_error.is_some());
    assert!(intent.invariant_holds());
}
