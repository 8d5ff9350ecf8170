//─────────────────────────────
//  In-memory document store driver
//─────────────────────────────

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orch_state_machine::check_transition;
use orch_types::{
    ActionResult, Conversation, ConversationId, ConversationState, EventId, EventLogEntry,
    IdempotencyKeyRecord, IntentId, MessageId, Receipt, ReceiptStatus, ReasoningIntent,
    UserMessage,
};
use tokio::sync::Mutex;

use crate::{DocumentStore, IdempotencyClaim, ReceiptMeta, StoreError};

/// A conversation document plus every subcollection scoped beneath it,
/// guarded by a single lock so appends and transitions compose into one
/// transaction (spec §5: "a transaction scoped to the root of the
/// conversation hierarchy").
#[derive(Debug, Default)]
struct ConversationAggregate {
    conversation: Option<Conversation>,
    messages: Vec<UserMessage>,
    intents: Vec<ReasoningIntent>,
    actions: Vec<ActionResult>,
    events: Vec<EventLogEntry>,
}

/// In-memory [`DocumentStore`] driver. Mirrors `toka-store-memory`'s
/// `Arc<RwLock<HashMap<..>>>` shape, generalized from one flat event map to
/// the conversation-scoped document tree spec §6 describes ("Persisted
/// layout").
///
/// Receipts and idempotency keys live in their own `DashMap`s rather than
/// behind the conversation lock, matching spec §3 Ownership ("independent,
/// process-wide"); a `DashMap`'s per-shard locking gives each key its own
/// atomic read-modify-write, which stands in for the "transaction scoped to
/// ... the receipt/key document" spec §5 requires.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    conversations: Arc<DashMap<ConversationId, Arc<Mutex<ConversationAggregate>>>>,
    receipts: Arc<DashMap<EventId, Receipt>>,
    idempotency_keys: Arc<DashMap<String, IdempotencyKeyRecord>>,
}

impl InMemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn aggregate_for(&self, id: ConversationId) -> Arc<Mutex<ConversationAggregate>> {
        self.conversations
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationAggregate::default())))
            .clone()
    }

    /// Number of conversations currently tracked, mirroring
    /// `MemoryBackend::event_count`'s introspection role.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    /// Drop every completed receipt older than `older_than`, and every
    /// idempotency key is left untouched (idempotency keys are immutable
    /// once written per spec §3 and have no expiry). Mirrors
    /// `InMemoryIdemStore::purge_expired`; not wired to a timer here —
    /// that's deployment-script territory.
    pub fn sweep_expired_receipts(&self, now: DateTime<Utc>, older_than: Duration) {
        let threshold = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        self.receipts.retain(|_, receipt| match receipt.completed_at {
            Some(completed_at) => now - completed_at < threshold,
            None => true,
        });
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_conversation(
        &self,
        id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(id);
        let mut guard = aggregate.lock().await;
        if guard.conversation.is_some() {
            return Err(StoreError::ConversationAlreadyExists(id));
        }
        guard.conversation = Some(Conversation::new(id, now));
        Ok(())
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let Some(entry) = self.conversations.get(&id) else {
            return Ok(None);
        };
        let aggregate = entry.value().clone();
        drop(entry);
        let guard = aggregate.lock().await;
        Ok(guard.conversation.clone())
    }

    async fn transition_state(
        &self,
        id: ConversationId,
        next: ConversationState,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(id);
        let mut guard = aggregate.lock().await;
        let conversation = guard
            .conversation
            .as_mut()
            .ok_or(StoreError::ConversationNotFound(id))?;
        check_transition(conversation.state, next)?;
        conversation.state = next;
        conversation.updated_at = now;
        tracing::debug!(conversation_id = %id, next = ?next, "conversation transitioned");
        Ok(())
    }

    async fn append_message(&self, message: UserMessage) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(message.conversation_id);
        let mut guard = aggregate.lock().await;
        if guard.conversation.is_none() {
            return Err(StoreError::ConversationNotFound(message.conversation_id));
        }
        guard.messages.push(message);
        Ok(())
    }

    async fn append_intent(&self, intent: ReasoningIntent) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(intent.conversation_id);
        let mut guard = aggregate.lock().await;
        if guard.conversation.is_none() {
            return Err(StoreError::ConversationNotFound(intent.conversation_id));
        }
        guard.intents.push(intent);
        Ok(())
    }

    async fn append_action_result(&self, result: ActionResult) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(result.conversation_id);
        let mut guard = aggregate.lock().await;
        if guard.conversation.is_none() {
            return Err(StoreError::ConversationNotFound(result.conversation_id));
        }
        guard.actions.push(result);
        Ok(())
    }

    async fn append_event_log_entry(&self, entry: EventLogEntry) -> Result<(), StoreError> {
        let aggregate = self.aggregate_for(entry.conversation_id);
        let mut guard = aggregate.lock().await;
        if guard.conversation.is_none() {
            return Err(StoreError::ConversationNotFound(entry.conversation_id));
        }
        guard.events.push(entry);
        Ok(())
    }

    async fn claim_receipt(
        &self,
        event_id: EventId,
        meta: ReceiptMeta,
        now: DateTime<Utc>,
        stale_threshold: Duration,
    ) -> Result<bool, StoreError> {
        let stale_threshold =
            chrono::Duration::from_std(stale_threshold).unwrap_or(chrono::Duration::zero());

        let claimed = match self.receipts.entry(event_id) {
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                // Branch 1: no receipt exists yet.
                vacant.insert(Receipt {
                    event_id,
                    handler: meta.handler,
                    conversation_id: meta.conversation_id,
                    message_id: meta.message_id,
                    status: ReceiptStatus::Processing,
                    claimed_at: now,
                    completed_at: None,
                    retried_at: None,
                });
                true
            }
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let receipt = occupied.get_mut();
                match receipt.status {
                    // Branch 2: genuine duplicate.
                    ReceiptStatus::Completed => false,
                    ReceiptStatus::Processing => {
                        if now - receipt.claimed_at < stale_threshold {
                            // Branch 3: another worker is active.
                            false
                        } else {
                            // Branch 4: prior worker crashed; reclaim.
                            receipt.claimed_at = now;
                            receipt.retried_at = Some(now);
                            true
                        }
                    }
                }
            }
        };

        // `ReceiptStatus` is a closed two-variant enum, so the "unknown
        // status" fallthrough spec §9 calls out can never actually be
        // reached here; the match above is already exhaustive. If a future
        // status variant is ever added, extending the match will force this
        // call site to be revisited rather than silently falling through.
        tracing::debug!(event_id = %event_id, claimed, "claim_receipt");
        Ok(claimed)
    }

    async fn complete_receipt(
        &self,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.receipts.get_mut(&event_id) {
            Some(mut receipt) => {
                receipt.status = ReceiptStatus::Completed;
                receipt.completed_at = Some(now);
            }
            None => {
                // A true upsert would merge into a partial document; without
                // prior metadata (handler/conversationId/messageId) there is
                // nothing meaningful to construct. Per spec §4.2 this must
                // not fail, so we log and treat it as a no-op rather than
                // fabricate a receipt with placeholder ownership fields.
                tracing::warn!(
                    event_id = %event_id,
                    "complete_receipt called for an event with no prior claim; ignoring"
                );
            }
        }
        Ok(())
    }

    async fn claim_idempotency_key(
        &self,
        key: String,
        message_id: MessageId,
        now: DateTime<Utc>,
    ) -> Result<IdempotencyClaim, StoreError> {
        match self.idempotency_keys.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(IdempotencyKeyRecord {
                    key,
                    message_id,
                    created_at: now,
                });
                Ok(IdempotencyClaim::New)
            }
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                Ok(IdempotencyClaim::Existing(occupied.get().message_id))
            }
        }
    }

    async fn find_action_result_by_intent_id(
        &self,
        conversation_id: ConversationId,
        intent_id: IntentId,
    ) -> Result<bool, StoreError> {
        let Some(entry) = self.conversations.get(&conversation_id) else {
            return Ok(false);
        };
        let aggregate = entry.value().clone();
        drop(entry);
        let guard = aggregate.lock().await;
        Ok(guard.actions.iter().any(|result| result.intent_id == intent_id))
    }

    async fn get_receipt(&self, event_id: EventId) -> Result<Option<Receipt>, StoreError> {
        Ok(self.receipts.get(&event_id).map(|entry| entry.value().clone()))
    }
}
