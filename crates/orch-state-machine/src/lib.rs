#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-state-machine** – Authoritative conversation transition table
//! (spec §4.2).
//!
//! This crate is pure and synchronous: it holds no handles to the store or
//! bus. `orch-store` calls [`allowed_transition`] from inside a
//! per-conversation transaction before writing a new state, which is what
//! gives the pipeline its only ordering guarantee (spec §5: "observable
//! conversation states progress monotonically along the permitted graph").

use orch_types::ConversationState as S;

/// The directed transition graph from spec §4.2, as an allow-list function.
///
/// `RECEIVED → REASONING_REQUESTED → {INTENT_VALIDATED, FAILED_VALIDATION}`,
/// then `INTENT_VALIDATED → ACTION_REQUESTED → {ACTION_COMPLETED,
/// FAILED_EXECUTION}`. The three terminal states have no outgoing edges.
pub fn allowed_transition(from: S, to: S) -> bool {
    matches!(
        (from, to),
        (S::Received, S::ReasoningRequested)
            | (S::ReasoningRequested, S::IntentValidated)
            | (S::ReasoningRequested, S::FailedValidation)
            | (S::IntentValidated, S::ActionRequested)
            | (S::ActionRequested, S::ActionCompleted)
            | (S::ActionRequested, S::FailedExecution)
    )
}

/// Raised when a caller attempts a transition outside the allowed graph
/// (spec §4.2: "Fails with `InvalidTransition` otherwise").
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// The state the conversation was actually in.
    pub from: S,
    /// The state the caller tried to move it to.
    pub to: S,
}

/// Check a transition, returning [`InvalidTransition`] instead of a bare
/// bool when the caller wants to propagate a typed error (the common case in
/// `orch-store`).
pub fn check_transition(from: S, to: S) -> Result<(), InvalidTransition> {
    if allowed_transition(from, to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_search_is_a_legal_walk() {
        assert!(allowed_transition(S::Received, S::ReasoningRequested));
        assert!(allowed_transition(S::ReasoningRequested, S::IntentValidated));
        assert!(allowed_transition(S::IntentValidated, S::ActionRequested));
        assert!(allowed_transition(S::ActionRequested, S::ActionCompleted));
    }

    #[test]
    fn validation_failure_branch_is_legal() {
        assert!(allowed_transition(S::ReasoningRequested, S::FailedValidation));
    }

    #[test]
    fn execution_failure_branch_is_legal() {
        assert!(allowed_transition(S::ActionRequested, S::FailedExecution));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [S::ActionCompleted, S::FailedValidation, S::FailedExecution] {
            for to in [
                S::Received,
                S::ReasoningRequested,
                S::IntentValidated,
                S::ActionRequested,
                S::ActionCompleted,
                S::FailedValidation,
                S::FailedExecution,
            ] {
                assert!(!allowed_transition(terminal, to), "{:?} -> {:?}", terminal, to);
            }
        }
    }

    #[test]
    fn cannot_skip_intent_validated() {
        assert!(!allowed_transition(S::ReasoningRequested, S::ActionRequested));
    }

    #[test]
    fn cannot_go_backwards() {
        assert!(!allowed_transition(S::ActionRequested, S::IntentValidated));
        assert!(!allowed_transition(S::IntentValidated, S::Received));
    }

    #[test]
    fn check_transition_reports_from_and_to() {
        let err = check_transition(S::Received, S::ActionCompleted).unwrap_err();
        assert_eq!(err.from, S::Received);
        assert_eq!(err.to, S::ActionCompleted);
    }
}
