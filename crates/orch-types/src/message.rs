use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, MessageId};

/// A user-submitted message. Immutable after creation (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Unique message identifier, minted by ingress.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Free-text content submitted by the client.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Client-supplied idempotency key this message was accepted under, if any.
    pub idempotency_key: Option<String>,
}

impl UserMessage {
    /// Construct a new message. There is no further mutation API: once built,
    /// only ownership (by reference) moves between crates.
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        content: String,
        created_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            content,
            created_at,
            idempotency_key,
        }
    }
}
