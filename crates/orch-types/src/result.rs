use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConversationId, IntentId, MessageId, ResultId};

/// The terminal output of the Executor, written exactly once per intent
/// (spec §3: "At most one ActionResult per intentId per conversation").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Unique result identifier.
    pub id: ResultId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// The intent this result was produced for.
    pub intent_id: IntentId,
    /// The originating message, threaded through for audit convenience.
    pub message_id: MessageId,
    /// Free-form result payload from the tool function.
    pub result: Map<String, Value>,
    /// Whether the tool invocation succeeded.
    pub success: bool,
    /// Present when `success` is `false`.
    pub error: Option<String>,
    /// When execution completed.
    pub executed_at: DateTime<Utc>,
}

impl ActionResult {
    /// Build a successful result.
    pub fn success(
        id: ResultId,
        conversation_id: ConversationId,
        intent_id: IntentId,
        message_id: MessageId,
        result: Map<String, Value>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            intent_id,
            message_id,
            result,
            success: true,
            error: None,
            executed_at,
        }
    }

    /// Build a failed result.
    pub fn failure(
        id: ResultId,
        conversation_id: ConversationId,
        intent_id: IntentId,
        message_id: MessageId,
        error: String,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            intent_id,
            message_id,
            result: Map::new(),
            success: false,
            error: Some(error),
            executed_at,
        }
    }
}
