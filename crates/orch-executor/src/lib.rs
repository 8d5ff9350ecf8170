#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-executor** – Executor worker (spec §4.5).
//!
//! Consumes `action_requested`, invokes a pluggable [`ToolFn`], persists the
//! result, and records the terminal outcome. Modeled as `(envelope, context)
//! -> result` per spec §9 re-architecture guidance, mirroring `orch-reasoner`.

use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use orch_bus::{Envelope, EventBus};
use orch_store::{DocumentStore, ReceiptMeta, StoreError};
use orch_types::{
    Action, ActionResult, ConversationState, EventLogEntry, EventType, IntentId, Producer,
    ResultId,
};
use serde_json::{Map, Value};

/// The outcome of invoking a tool function (spec §4.5 step 4:
/// `(action, parameters) -> {success, result, error?}`). Determinism is
/// required of the implementation so repeated execution — under duplicate
/// delivery the dedup layers failed to catch — yields the same output.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Whether the tool invocation succeeded.
    pub success: bool,
    /// Free-form result payload.
    pub result: Map<String, Value>,
    /// Present when `success` is `false`.
    pub error: Option<String>,
}

/// A deterministic `(action, parameters) -> ToolOutput` mapping, supplied by
/// the deployment (spec §1 treats this as an external collaborator).
#[async_trait]
pub trait ToolFn: Send + Sync {
    /// Invoke the tool for the given action and parameters.
    async fn invoke(&self, action: Action, parameters: &Map<String, Value>) -> ToolOutput;
}

/// Errors a real transport would nack on (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The envelope's payload was missing or malformed — same policy as a
    /// bus decode failure: ack, do not retry.
    #[error("action_requested envelope for conversation {0} has a missing or malformed payload")]
    MalformedPayload(orch_types::ConversationId),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handles to everything the Executor needs per delivery.
pub struct ExecutorContext {
    /// Document store handle.
    pub store: Arc<dyn DocumentStore>,
    /// Bus adapter handle (unused for publishing — the Executor is the
    /// terminal stage — but kept for symmetry with `ReasonerContext` and in
    /// case a future stage subscribes to completion events).
    pub bus: Arc<dyn EventBus>,
    /// The tool function to invoke.
    pub tool_fn: Arc<dyn ToolFn>,
    /// Stale-receipt reclamation window.
    pub receipt_stale_threshold: Duration,
}

fn parse_payload(envelope: &Envelope) -> Option<(IntentId, Action, Map<String, Value>)> {
    let intent_id = envelope
        .payload
        .get("intentId")
        .and_then(Value::as_str)
        .and_then(|raw| uuid::Uuid::from_str(raw).ok())
        .map(IntentId::from)?;
    let action = envelope
        .payload
        .get("action")
        .and_then(Value::as_str)
        .and_then(|raw| Action::from_str(raw).ok())?;
    let parameters = envelope
        .payload
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some((intent_id, action, parameters))
}

/// Handle one `action_requested` delivery (spec §4.5 steps 2-8).
pub async fn handle(envelope: &Envelope, ctx: &ExecutorContext) -> Result<(), WorkerError> {
    let now = Utc::now();

    // Step 2: claim the receipt.
    let claimed = ctx
        .store
        .claim_receipt(
            envelope.event_id,
            ReceiptMeta {
                handler: "executor".to_string(),
                conversation_id: envelope.conversation_id,
                message_id: envelope.message_id,
            },
            now,
            ctx.receipt_stale_threshold,
        )
        .await?;
    if !claimed {
        tracing::debug!(event_id = %envelope.event_id, "executor: receipt already claimed, acking");
        return Ok(());
    }

    let (intent_id, action, parameters) =
        parse_payload(envelope).ok_or(WorkerError::MalformedPayload(envelope.conversation_id))?;

    // Step 3: defense-in-depth against double execution.
    if ctx
        .store
        .find_action_result_by_intent_id(envelope.conversation_id, intent_id)
        .await?
    {
        tracing::debug!(
            conversation_id = %envelope.conversation_id,
            intent_id = %intent_id,
            "executor: action result already exists, acking"
        );
        ctx.store.complete_receipt(envelope.event_id, now).await?;
        return Ok(());
    }

    // Step 4: invoke the tool function.
    let output = ctx.tool_fn.invoke(action, &parameters).await;

    // Step 5: persist the result.
    let result = if output.success {
        ActionResult::success(
            ResultId::new(),
            envelope.conversation_id,
            intent_id,
            envelope.message_id,
            output.result,
            now,
        )
    } else {
        ActionResult::failure(
            ResultId::new(),
            envelope.conversation_id,
            intent_id,
            envelope.message_id,
            output.error.unwrap_or_else(|| "tool invocation failed".to_string()),
            now,
        )
    };
    let succeeded = result.success;
    ctx.store.append_action_result(result).await?;

    // Step 6: append an event-log entry. This is the Executor's own audit
    // record of having handled the delivery, so it gets a fresh id rather
    // than reusing the inbound envelope's — the Reasoner already logged its
    // own entry under `envelope.event_id` when it published this event.
    ctx.store
        .append_event_log_entry(EventLogEntry {
            id: orch_types::EventId::new(),
            conversation_id: envelope.conversation_id,
            event_type: EventType::ActionRequested,
            producer: Producer::Executor,
            recorded_at: now,
        })
        .await?;

    // Step 7: terminal transition.
    let next = if succeeded {
        ConversationState::ActionCompleted
    } else {
        ConversationState::FailedExecution
    };
    ctx.store
        .transition_state(envelope.conversation_id, next, now)
        .await?;

    // Step 8: complete the receipt.
    ctx.store.complete_receipt(envelope.event_id, now).await?;
    Ok(())
}

/// Subscribe to `action-requested` and call [`handle`] on every delivery
/// until the bus closes, mirroring `orch_reasoner::run`.
pub async fn run(topic_action: &str, ctx: ExecutorContext) {
    let mut receiver = ctx.bus.subscribe(topic_action);
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if let Err(err) = handle(&envelope, &ctx).await {
                    tracing::error!(event_id = %envelope.event_id, error = %err, "executor: handler failed");
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "executor: lagged behind the action-requested stream");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                tracing::info!("executor: bus closed, stopping");
                break;
            }
        }
    }
}
