#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-store** – State store and transition protocol (spec §4.2).
//!
//! All multi-document consistency is obtained via single-document
//! transactions over the [`DocumentStore`] trait. [`InMemoryStore`] is the
//! only driver provided here; a durable sled/sqlite driver is a documented
//! extension point (see the repository's design notes), following the same
//! shape `toka-store-sled`/`toka-store-sqlite` give `toka-store-core`.

mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orch_state_machine::InvalidTransition;
use orch_types::{
    ActionResult, Conversation, ConversationId, ConversationState, EventId, EventLogEntry,
    IntentId, MessageId, Receipt, ReasoningIntent, UserMessage,
};

pub use memory::InMemoryStore;

/// Metadata a caller supplies when claiming a receipt (spec §3: `Receipt`
/// holds `handler`, `conversationId`, `messageId` beyond its lifecycle
/// fields).
#[derive(Debug, Clone)]
pub struct ReceiptMeta {
    /// Logical name of the handler claiming the event (e.g. `"reasoner"`).
    pub handler: String,
    /// Conversation the event belongs to.
    pub conversation_id: ConversationId,
    /// Message the event belongs to.
    pub message_id: MessageId,
}

/// Outcome of [`DocumentStore::claim_idempotency_key`] (spec §4.2:
/// `{isNew: true}` or `{isNew: false, existingMessageId}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyClaim {
    /// The key was newly written by this call.
    New,
    /// The key already belonged to another message.
    Existing(MessageId),
}

impl IdempotencyClaim {
    /// `true` iff this call is the one that newly claimed the key.
    pub fn is_new(self) -> bool {
        matches!(self, IdempotencyClaim::New)
    }
}

/// Errors raised by a [`DocumentStore`] implementation (spec §7:
/// `InvalidTransition` bubbles up except where a handler explicitly
/// tolerates a resumed-from-retry state; `StoreError` otherwise signals a
/// transient failure that should cause the caller to nack).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `createConversation` was called with an id that already exists.
    #[error("conversation {0} already exists")]
    ConversationAlreadyExists(ConversationId),
    /// An operation referenced a conversation that has no document.
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),
    /// A requested state transition is not in the allowed-transition table.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Document-store abstraction over conversations and their subcollections,
/// plus the two global deduplication collections (receipts, idempotency
/// keys). Every operation here corresponds exactly to one bullet in spec
/// §4.2.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a new conversation in state `RECEIVED`. Fails if `id` already
    /// exists.
    async fn create_conversation(
        &self,
        id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Fetch the current conversation document, if any.
    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Check `(current → next)` against the transition table and, if legal,
    /// write `next` and bump `updatedAt` in one transaction.
    async fn transition_state(
        &self,
        id: ConversationId,
        next: ConversationState,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Append an immutable message beneath its conversation.
    async fn append_message(&self, message: UserMessage) -> Result<(), StoreError>;

    /// Append a reasoning intent beneath its conversation (written exactly
    /// once by the Reasoner, valid or invalid).
    async fn append_intent(&self, intent: ReasoningIntent) -> Result<(), StoreError>;

    /// Append an action result beneath its conversation (written exactly
    /// once by the Executor).
    async fn append_action_result(&self, result: ActionResult) -> Result<(), StoreError>;

    /// Append an audit entry beneath its conversation's event log.
    async fn append_event_log_entry(&self, entry: EventLogEntry) -> Result<(), StoreError>;

    /// The central deduplication primitive (spec §4.2's 4-branch algorithm).
    /// Returns `true` iff the caller may proceed with handling the event.
    async fn claim_receipt(
        &self,
        event_id: EventId,
        meta: ReceiptMeta,
        now: DateTime<Utc>,
        stale_threshold: Duration,
    ) -> Result<bool, StoreError>;

    /// Idempotent merge-write marking a receipt completed. Must not fail if
    /// the receipt is absent.
    async fn complete_receipt(&self, event_id: EventId, now: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Claim a client-supplied idempotency key for a message. Never
    /// overwrites an existing claim.
    async fn claim_idempotency_key(
        &self,
        key: String,
        message_id: MessageId,
        now: DateTime<Utc>,
    ) -> Result<IdempotencyClaim, StoreError>;

    /// Existence check used by the Executor as a second line of defense
    /// against double execution.
    async fn find_action_result_by_intent_id(
        &self,
        conversation_id: ConversationId,
        intent_id: IntentId,
    ) -> Result<bool, StoreError>;

    /// Fetch a receipt by event id, for tests and operator inspection.
    async fn get_receipt(&self, event_id: EventId) -> Result<Option<Receipt>, StoreError>;
}
