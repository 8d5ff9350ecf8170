use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ConversationId;

/// The closed set of states a conversation can occupy (spec §3).
///
/// `ActionCompleted`, `FailedValidation`, and `FailedExecution` are terminal:
/// no further transition is permitted out of them (see `orch-state-machine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    /// Message accepted by ingress, not yet handed to the reasoner.
    Received,
    /// `reasoning_requested` event published; awaiting the reasoner.
    ReasoningRequested,
    /// Reasoner produced a schema-valid intent, not yet dispatched to execution.
    IntentValidated,
    /// `action_requested` event published; awaiting the executor.
    ActionRequested,
    /// Executor ran the tool and recorded a successful result. Terminal.
    ActionCompleted,
    /// Reasoner's candidate failed schema validation. Terminal.
    FailedValidation,
    /// Executor's tool invocation failed. Terminal.
    FailedExecution,
}

impl ConversationState {
    /// Whether this state is one of the three terminal states in spec §3.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ActionCompleted | Self::FailedValidation | Self::FailedExecution
        )
    }
}

/// The root aggregate of the pipeline. Owns the lifetime of every message,
/// intent, result, and event-log entry scoped beneath it (spec §3 Ownership).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// Current state; always a member of the closed set above.
    pub state: ConversationState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent state transition.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Construct a brand-new conversation in the initial `Received` state.
    pub fn new(id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            state: ConversationState::Received,
            created_at: now,
            updated_at: now,
        }
    }
}
