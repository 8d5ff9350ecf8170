#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-reasoner** – Reasoner worker (spec §4.4).
//!
//! Consumes `reasoning_requested`, invokes a pluggable [`ReasoningFn`],
//! validates the result against the intent schema, persists it, and either
//! fails the conversation or dispatches to the Executor. Modeled as
//! `(envelope, context) -> result` per spec §9 re-architecture guidance, with
//! a `run` loop that is the in-process stand-in for "pluggable behind the
//! transport."

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use orch_bus::{BusError, Envelope, EventBus, TOPIC_ACTION_REQUESTED};
use orch_schema::{validate_intent, RawIntentCandidate, ValidationOutcome};
use orch_store::{DocumentStore, ReceiptMeta, StoreError};
use orch_types::{ConversationState, EventLogEntry, EventType, IntentId, Producer, ReasoningIntent};
use serde_json::{Map, Value};

/// The output of a reasoning function: an unvalidated candidate action
/// (spec §4.4 step 3: "the spec treats it as a black box that returns an
/// intent candidate"). IDs are filled in by the Reasoner, not the function.
#[derive(Debug, Clone)]
pub struct ReasoningOutput {
    /// Proposed action name (validated against the closed set downstream).
    pub action: String,
    /// Free-form parameters for the action.
    pub parameters: Map<String, Value>,
    /// Self-reported confidence.
    pub confidence: f64,
}

/// A pure, deterministic `content -> intent candidate` mapping, supplied by
/// the deployment (spec §1 treats this as an external collaborator).
#[async_trait]
pub trait ReasoningFn: Send + Sync {
    /// Reason over the given message content.
    async fn reason(&self, content: &str) -> ReasoningOutput;
}

/// Handles produced by `run` errors that a real transport would nack on
/// (spec §7: `StoreError`/`BusError` raise → nack → redelivery).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The envelope's payload was missing the `content` field the Reasoner
    /// needs. Treated the same as a bus decode failure (spec §7
    /// `DecodeError`): ack, do not retry.
    #[error("reasoning_requested envelope for conversation {0} is missing a string \"content\" payload field")]
    MissingContent(orch_types::ConversationId),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A bus publish failed after the intent was already validated; the
    /// caller must nack so the stale-receipt path retries (spec §4.4).
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Handles to everything the Reasoner needs per delivery, injected rather
/// than reached for as a process-global (spec §9 re-architecture guidance).
pub struct ReasonerContext {
    /// Document store handle.
    pub store: Arc<dyn DocumentStore>,
    /// Bus adapter handle.
    pub bus: Arc<dyn EventBus>,
    /// The reasoning function to invoke.
    pub reasoning_fn: Arc<dyn ReasoningFn>,
    /// Publish target for `action_requested` events.
    pub topic_action: String,
    /// Stale-receipt reclamation window.
    pub receipt_stale_threshold: Duration,
}

/// Handle one `reasoning_requested` delivery (spec §4.4 steps 2-7; step 1,
/// envelope decoding, is the bus adapter's concern and already happened by
/// the time `handle` receives a typed [`Envelope`]).
pub async fn handle(envelope: &Envelope, ctx: &ReasonerContext) -> Result<(), WorkerError> {
    let now = Utc::now();

    // Step 2: claim the receipt.
    let claimed = ctx
        .store
        .claim_receipt(
            envelope.event_id,
            ReceiptMeta {
                handler: "reasoner".to_string(),
                conversation_id: envelope.conversation_id,
                message_id: envelope.message_id,
            },
            now,
            ctx.receipt_stale_threshold,
        )
        .await?;
    if !claimed {
        tracing::debug!(event_id = %envelope.event_id, "reasoner: receipt already claimed, acking");
        return Ok(());
    }

    let content = envelope
        .payload
        .get("content")
        .and_then(Value::as_str)
        .ok_or(WorkerError::MissingContent(envelope.conversation_id))?;

    // Step 3: invoke the reasoning function.
    let output = ctx.reasoning_fn.reason(content).await;

    // Step 4: validate against the intent schema.
    let intent_id = IntentId::new();
    let candidate = RawIntentCandidate {
        intent_id: intent_id.0.to_string(),
        conversation_id: envelope.conversation_id.to_string(),
        message_id: envelope.message_id.to_string(),
        action: output.action,
        parameters: Value::Object(output.parameters),
        confidence: output.confidence,
    };
    let outcome = validate_intent(&candidate);

    // Step 5: persist the intent document, always.
    let intent = match &outcome {
        ValidationOutcome::Valid(data) => ReasoningIntent::valid(
            intent_id,
            envelope.conversation_id,
            envelope.message_id,
            data.action.to_string(),
            data.parameters.clone(),
            data.confidence,
            now,
        ),
        ValidationOutcome::Invalid { error } => ReasoningIntent::invalid(
            intent_id,
            envelope.conversation_id,
            envelope.message_id,
            candidate.action.clone(),
            candidate
                .parameters
                .as_object()
                .cloned()
                .unwrap_or_default(),
            candidate.confidence,
            now,
            error.clone(),
        ),
    };
    ctx.store.append_intent(intent).await?;

    match outcome {
        ValidationOutcome::Invalid { .. } => {
            // Step 6: invalid candidate.
            ctx.store
                .transition_state(envelope.conversation_id, ConversationState::FailedValidation, now)
                .await?;
            ctx.store.complete_receipt(envelope.event_id, now).await?;
            Ok(())
        }
        ValidationOutcome::Valid(data) => {
            // Step 7: valid candidate — the two-step transition.
            //
            // If a prior attempt crashed after committing `IntentValidated`
            // but before completing the receipt, the stale-receipt path
            // redelivers and we land here again with the conversation
            // already in `IntentValidated`. The state machine only allows
            // `IntentValidated -> ActionRequested`, so re-attempting
            // `-> IntentValidated` fails; we tolerate exactly that one
            // shape of `InvalidTransition` and resume from here (spec
            // §4.4's "tolerates this by attempting the transition and
            // ignoring InvalidTransition when current already equals
            // INTENT_VALIDATED").
            match ctx
                .store
                .transition_state(envelope.conversation_id, ConversationState::IntentValidated, now)
                .await
            {
                Ok(()) => {}
                Err(StoreError::InvalidTransition(err))
                    if err.from == ConversationState::IntentValidated
                        && err.to == ConversationState::IntentValidated =>
                {
                    tracing::debug!(
                        conversation_id = %envelope.conversation_id,
                        "reasoner: resuming a retried delivery already at INTENT_VALIDATED"
                    );
                }
                Err(other) => return Err(other.into()),
            }

            let action_payload = {
                let mut payload = Map::new();
                payload.insert("intentId".to_string(), Value::String(intent_id.to_string()));
                payload.insert("action".to_string(), Value::String(data.action.to_string()));
                payload.insert("parameters".to_string(), Value::Object(data.parameters));
                payload.insert(
                    "confidence".to_string(),
                    serde_json::Number::from_f64(data.confidence)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                );
                payload
            };

            let action_event_id = orch_types::EventId::new();
            let action_envelope = Envelope {
                event_id: action_event_id,
                event_type: EventType::ActionRequested,
                conversation_id: envelope.conversation_id,
                message_id: envelope.message_id,
                timestamp: now,
                producer: Producer::Reasoner,
                payload: action_payload,
            };

            // If this publish fails, we must raise so the bus redelivers;
            // we've already committed `IntentValidated`, so the retry's
            // tolerance branch above covers the resumed attempt.
            ctx.bus.publish(&ctx.topic_action, &action_envelope)?;

            ctx.store
                .append_event_log_entry(EventLogEntry {
                    id: action_event_id,
                    conversation_id: envelope.conversation_id,
                    event_type: EventType::ActionRequested,
                    producer: Producer::Reasoner,
                    recorded_at: now,
                })
                .await?;

            ctx.store
                .transition_state(envelope.conversation_id, ConversationState::ActionRequested, now)
                .await?;

            ctx.store.complete_receipt(envelope.event_id, now).await?;
            Ok(())
        }
    }
}

/// Subscribe to `reasoning-requested` and call [`handle`] on every delivery
/// until the bus closes. Mirrors `toka-cli::handle_daemon`'s event-loop
/// shape; this in-memory transport has no redelivery, so a `handle` error
/// here is logged rather than nacked.
pub async fn run(topic_reasoning: &str, ctx: ReasonerContext) {
    let mut receiver = ctx.bus.subscribe(topic_reasoning);
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if let Err(err) = handle(&envelope, &ctx).await {
                    tracing::error!(event_id = %envelope.event_id, error = %err, "reasoner: handler failed");
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "reasoner: lagged behind the reasoning-requested stream");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                tracing::info!("reasoner: bus closed, stopping");
                break;
            }
        }
    }
}

/// Convenience re-export so callers constructing a context don't need to
/// depend on `orch-bus` solely for this constant.
pub const DEFAULT_TOPIC_ACTION: &str = TOPIC_ACTION_REQUESTED;

#[cfg(test)]
mod tests {
    use super::*;
    use orch_bus::InMemoryBus;
    use orch_store::InMemoryStore;
    use orch_types::{ConversationId, MessageId};

    struct AlwaysSearch;

    #[async_trait]
    impl ReasoningFn for AlwaysSearch {
        async fn reason(&self, _content: &str) -> ReasoningOutput {
            ReasoningOutput {
                action: "search".to_string(),
                parameters: Map::new(),
                confidence: 0.9,
            }
        }
    }

    struct AlwaysDance;

    #[async_trait]
    impl ReasoningFn for AlwaysDance {
        async fn reason(&self, _content: &str) -> ReasoningOutput {
            ReasoningOutput {
                action: "dance".to_string(),
                parameters: Map::new(),
                confidence: 0.9,
            }
        }
    }

    fn content_envelope(conversation_id: ConversationId, message_id: MessageId) -> Envelope {
        let mut payload = Map::new();
        payload.insert("content".to_string(), Value::String("search for cats".to_string()));
        Envelope {
            event_id: orch_types::EventId::new(),
            event_type: EventType::ReasoningRequested,
            conversation_id,
            message_id,
            timestamp: Utc::now(),
            producer: Producer::Api,
            payload,
        }
    }

    async fn seeded_store(conversation_id: ConversationId) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.create_conversation(conversation_id, Utc::now()).await.unwrap();
        store
            .transition_state(conversation_id, ConversationState::ReasoningRequested, Utc::now())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn valid_candidate_dispatches_to_action_requested() {
        let conversation_id = ConversationId::new();
        let message_id = MessageId::new();
        let store = seeded_store(conversation_id).await;
        let bus = Arc::new(InMemoryBus::default());
        let mut action_rx = bus.subscribe(orch_bus::TOPIC_ACTION_REQUESTED);

        let ctx = ReasonerContext {
            store: store.clone(),
            bus: bus.clone(),
            reasoning_fn: Arc::new(AlwaysSearch),
            topic_action: orch_bus::TOPIC_ACTION_REQUESTED.to_string(),
            receipt_stale_threshold: Duration::from_secs(120),
        };

        handle(&content_envelope(conversation_id, message_id), &ctx)
            .await
            .unwrap();

        let conversation = store.get_conversation(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.state, ConversationState::ActionRequested);

        let published = action_rx.try_recv().expect("action_requested should publish");
        assert_eq!(published.payload.get("action").unwrap(), "search");
    }

    #[tokio::test]
    async fn invalid_candidate_fails_validation_without_dispatching() {
        let conversation_id = ConversationId::new();
        let message_id = MessageId::new();
        let store = seeded_store(conversation_id).await;
        let bus = Arc::new(InMemoryBus::default());
        let mut action_rx = bus.subscribe(orch_bus::TOPIC_ACTION_REQUESTED);

        let ctx = ReasonerContext {
            store: store.clone(),
            bus: bus.clone(),
            reasoning_fn: Arc::new(AlwaysDance),
            topic_action: orch_bus::TOPIC_ACTION_REQUESTED.to_string(),
            receipt_stale_threshold: Duration::from_secs(120),
        };

        handle(&content_envelope(conversation_id, message_id), &ctx)
            .await
            .unwrap();

        let conversation = store.get_conversation(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.state, ConversationState::FailedValidation);
        assert!(action_rx.try_recv().is_err(), "invalid intent must not dispatch");
    }

    #[tokio::test]
    async fn duplicate_delivery_is_a_no_op_after_receipt_completes() {
        let conversation_id = ConversationId::new();
        let message_id = MessageId::new();
        let store = seeded_store(conversation_id).await;
        let bus = Arc::new(InMemoryBus::default());

        let ctx = ReasonerContext {
            store: store.clone(),
            bus: bus.clone(),
            reasoning_fn: Arc::new(AlwaysSearch),
            topic_action: orch_bus::TOPIC_ACTION_REQUESTED.to_string(),
            receipt_stale_threshold: Duration::from_secs(120),
        };

        let envelope = content_envelope(conversation_id, message_id);
        handle(&envelope, &ctx).await.unwrap();
        // A second, identical delivery of the same event id must short-circuit.
        handle(&envelope, &ctx).await.unwrap();
    }
}
