use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, EventId};

/// Who produced an event, carried on the wire envelope (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    /// The ingress HTTP service.
    Api,
    /// The reasoner worker.
    Reasoner,
    /// The executor worker.
    Executor,
}

/// The two event types that flow through the bus (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Published by ingress once a message is persisted.
    ReasoningRequested,
    /// Published by the reasoner once an intent validates.
    ActionRequested,
}

impl EventType {
    /// The logical topic name this event type is published to (spec §6).
    pub fn topic_name(self) -> &'static str {
        match self {
            EventType::ReasoningRequested => "reasoning-requested",
            EventType::ActionRequested => "action-requested",
        }
    }

    /// The companion dead-letter topic name (spec §6). No automated routing
    /// exists in this workspace; the constant exists purely so operators and
    /// tests can name the topic consistently (spec §9: dead-letter
    /// consumption is an intentional manual step).
    pub fn dead_letter_topic_name(self) -> &'static str {
        match self {
            EventType::ReasoningRequested => "reasoning-dead-letter",
            EventType::ActionRequested => "action-dead-letter",
        }
    }
}

/// An append-only audit record of a significant transition, scoped beneath a
/// conversation (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// The event's unique id; doubles as the receipt key.
    pub id: EventId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// What kind of event this was.
    pub event_type: EventType,
    /// Which component produced it.
    pub producer: Producer,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}
