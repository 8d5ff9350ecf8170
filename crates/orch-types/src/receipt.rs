use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, EventId, MessageId};

/// Lifecycle of a [`Receipt`]: `processing` progresses only to `completed`
/// (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// A handler has claimed this event and is (or was) working on it.
    Processing,
    /// The handler finished successfully; no further claim should succeed.
    Completed,
}

/// A per-event deduplication token, global in scope (spec §3: receipts "are
/// independent, process-wide; they outlive conversations").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// The event this receipt deduplicates, and its storage key.
    pub event_id: EventId,
    /// Logical name of the handler that claimed it (e.g. `"reasoner"`).
    pub handler: String,
    /// Conversation the event belongs to, carried for operator inspection.
    pub conversation_id: ConversationId,
    /// Message the event belongs to, carried for operator inspection.
    pub message_id: MessageId,
    /// Current lifecycle state.
    pub status: ReceiptStatus,
    /// When this receipt (or its most recent reclaim) was claimed.
    pub claimed_at: DateTime<Utc>,
    /// When the handler finished, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// When a stale claim was most recently reclaimed by a new worker.
    pub retried_at: Option<DateTime<Utc>>,
}
