use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use orch_bus::{Envelope, EventBus};
use orch_store::{DocumentStore, IdempotencyClaim, StoreError};
use orch_types::{
    Conversation, ConversationId, ConversationState, EventLogEntry, EventType, MessageId,
    Producer, UserMessage,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use uuid::Uuid;

use crate::AppState;

/// `POST /messages` request body (spec §6).
#[derive(Debug, Deserialize)]
pub struct PostMessagesRequest {
    /// Free-text message content. Must be a non-empty string.
    pub content: Option<String>,
    /// Optional conversation to append to, instead of starting a new one.
    #[serde(rename = "conversationId")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

impl From<StoreError> for Response {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConversationNotFound(id) => {
                error_response(StatusCode::NOT_FOUND, format!("conversation {id} not found"))
            }
            other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

/// `POST /messages` (spec §4.3): the 8-step ingress protocol.
pub async fn post_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PostMessagesRequest>,
) -> Response {
    // Step 1: validate body.
    let Some(content) = request
        .content
        .as_ref()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid \"content\" field");
    };

    // Step 2: mint messageId.
    let message_id = MessageId::new();
    let now = Utc::now();

    // Step 3: idempotency-key dedup, ahead of any persistence.
    if let Some(key) = headers
        .get("X-Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .filter(|key| !key.is_empty())
    {
        match state
            .store
            .claim_idempotency_key(key.to_string(), message_id, now)
            .await
        {
            Ok(IdempotencyClaim::Existing(existing_message_id)) => {
                return (
                    StatusCode::OK,
                    Json(json!({
                        "messageId": existing_message_id,
                        "duplicate": true,
                        "message": "duplicate submission; original message already accepted",
                    })),
                )
                    .into_response();
            }
            Ok(IdempotencyClaim::New) => {}
            Err(err) => return Response::from(err),
        }
    }

    // Step 4: resolve the conversation — mint a fresh one, or reuse an
    // existing one if the caller supplied a conversationId.
    let conversation_id = match &request.conversation_id {
        None => {
            let id = ConversationId::new();
            if let Err(err) = state.store.create_conversation(id, now).await {
                return Response::from(err);
            }
            id
        }
        Some(raw) => match Uuid::from_str(raw) {
            Ok(uuid) => {
                let id = ConversationId::from(uuid);
                match state.store.get_conversation(id).await {
                    Ok(Some(_)) => id,
                    Ok(None) => {
                        return error_response(StatusCode::NOT_FOUND, "Conversation not found")
                    }
                    Err(err) => return Response::from(err),
                }
            }
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "conversationId must be a valid UUID")
            }
        },
    };

    // Step 5: persist the message.
    let message = UserMessage::new(
        message_id,
        conversation_id,
        content.clone(),
        now,
        headers
            .get("X-Idempotency-Key")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    if let Err(err) = state.store.append_message(message).await {
        return Response::from(err);
    }

    // Step 6: publish + log the reasoning-requested event. The message
    // content rides along in the payload map so the Reasoner doesn't need a
    // separate store round trip to fetch it.
    let event_id = orch_types::EventId::new();
    let mut payload = Map::new();
    payload.insert("content".to_string(), serde_json::Value::String(content));
    let envelope = Envelope {
        event_id,
        event_type: EventType::ReasoningRequested,
        conversation_id,
        message_id,
        timestamp: now,
        producer: Producer::Api,
        payload,
    };
    if let Err(err) = state.bus.publish(&state.config.topic_reasoning, &envelope) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    }
    if let Err(err) = state
        .store
        .append_event_log_entry(EventLogEntry {
            id: event_id,
            conversation_id,
            event_type: EventType::ReasoningRequested,
            producer: Producer::Api,
            recorded_at: now,
        })
        .await
    {
        return Response::from(err);
    }

    // Step 7: advance the conversation. Reusing a non-RECEIVED conversation
    // is reported as 409, not 500 (resolved Open Question).
    if let Err(err) = state
        .store
        .transition_state(conversation_id, ConversationState::ReasoningRequested, now)
        .await
    {
        return match err {
            StoreError::InvalidTransition(_) => error_response(
                StatusCode::CONFLICT,
                "conversation is not accepting new messages",
            ),
            other => Response::from(other),
        };
    }

    // Step 8: respond.
    (
        StatusCode::CREATED,
        Json(json!({
            "messageId": message_id,
            "conversationId": conversation_id,
            "eventId": event_id,
            "state": "REASONING_REQUESTED",
        })),
    )
        .into_response()
}

/// `GET /conversations/{id}`.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let Ok(uuid) = Uuid::from_str(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Conversation not found");
    };
    match state.store.get_conversation(ConversationId::from(uuid)).await {
        Ok(Some(conversation)) => conversation_response(conversation),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Conversation not found"),
        Err(err) => Response::from(err),
    }
}

fn conversation_response(conversation: Conversation) -> Response {
    (StatusCode::OK, Json(conversation)).into_response()
}

/// `GET /health` (spec §6, supplemented per SPEC_FULL §2).
pub async fn get_health(State(_state): State<AppState>) -> Response {
    (StatusCode::OK, Json(json!({"status": "ok", "service": "api"}))).into_response()
}
