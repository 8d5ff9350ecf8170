use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use serde_json::Value;

use crate::{ConversationId, IntentId, MessageId};

/// A reasoning intent, written exactly once by the Reasoner (spec §3).
///
/// `action` is kept as a plain string rather than the closed [`crate::Action`]
/// enum: an *invalid* candidate (e.g. `"dance"`) is still persisted so the
/// validation failure is auditable, and the closed-set check belongs to the
/// schema validator, not to this data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningIntent {
    /// Unique intent identifier.
    pub id: IntentId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// The message this intent was reasoned from.
    pub message_id: MessageId,
    /// Requested action, as proposed by the reasoning function.
    pub action: String,
    /// Free-form parameter mapping.
    pub parameters: Map<String, Value>,
    /// Reasoning function's self-reported confidence, expected in `[0, 1]`.
    pub confidence: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether this intent passed schema validation.
    pub valid: bool,
    /// Present iff `valid` is `false`.
    pub validation_error: Option<String>,
}

impl ReasoningIntent {
    /// Build a valid intent. Panics in debug builds if the caller passes a
    /// `validation_error` — use [`ReasoningIntent::invalid`] for the other case.
    #[allow(clippy::too_many_arguments)]
    pub fn valid(
        id: IntentId,
        conversation_id: ConversationId,
        message_id: MessageId,
        action: String,
        parameters: Map<String, Value>,
        confidence: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            message_id,
            action,
            parameters,
            confidence,
            created_at,
            valid: true,
            validation_error: None,
        }
    }

    /// Build an invalid intent, carrying the validation error string.
    #[allow(clippy::too_many_arguments)]
    pub fn invalid(
        id: IntentId,
        conversation_id: ConversationId,
        message_id: MessageId,
        action: String,
        parameters: Map<String, Value>,
        confidence: f64,
        created_at: DateTime<Utc>,
        validation_error: String,
    ) -> Self {
        Self {
            id,
            conversation_id,
            message_id,
            action,
            parameters,
            confidence,
            created_at,
            valid: false,
            validation_error: Some(validation_error),
        }
    }

    /// `valid ⇔ validation_error.is_none()` (spec §3 invariant), re-checked
    /// defensively at every read site that trusts this type.
    pub fn invariant_holds(&self) -> bool {
        self.valid == self.validation_error.is_none()
    }
}
