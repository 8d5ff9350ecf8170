#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-bus** – Bus adapter for the agent pipeline orchestrator (spec §4.1).
//!
//! Publishes a typed [`Envelope`] to a named topic and decodes the reverse on
//! delivery. This crate makes no assumptions about the underlying transport;
//! [`InMemoryBus`] is the only driver provided, mirroring
//! `toka-bus-core::InMemoryBus` — a `tokio::sync::broadcast` channel per
//! topic, created lazily on first publish or subscribe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orch_types::{ConversationId, EventId, EventType, MessageId, Producer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

//─────────────────────────────
//  Topic names
//─────────────────────────────

/// Logical topic for `reasoning_requested` events (spec §6).
pub const TOPIC_REASONING_REQUESTED: &str = "reasoning-requested";
/// Logical topic for `action_requested` events (spec §6).
pub const TOPIC_ACTION_REQUESTED: &str = "action-requested";
/// Dead-letter companion to [`TOPIC_REASONING_REQUESTED`]; no automated
/// routing exists here — see spec §9 ("intentional operator-manual step").
pub const TOPIC_REASONING_DEAD_LETTER: &str = "reasoning-dead-letter";
/// Dead-letter companion to [`TOPIC_ACTION_REQUESTED`].
pub const TOPIC_ACTION_DEAD_LETTER: &str = "action-dead-letter";

//─────────────────────────────
//  Envelope
//─────────────────────────────

/// The transport-level message carrying a typed event (spec §4.1, §6).
///
/// `eventId`, `eventType`, and `conversationId` additionally double as
/// transport-level attributes in a real transport (subscription filtering,
/// operator inspection); on this in-memory driver they're simply fields of
/// the same struct, since there is no separate attribute channel to mirror
/// them into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id of the logical event; also the receipt key.
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    /// What kind of event this is.
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    /// The conversation this event belongs to.
    #[serde(rename = "conversationId")]
    pub conversation_id: ConversationId,
    /// The message that triggered this event.
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    /// Publish time, ISO-8601 UTC on the wire.
    pub timestamp: DateTime<Utc>,
    /// Which component produced this event.
    pub producer: Producer,
    /// Free-form event-specific payload.
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Serialize to the wire JSON form (spec §6 "Event envelope (wire)").
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Envelope always serializes")
    }

    /// Decode a delivered payload. A missing or undecodable payload is a
    /// [`DecodeError`], which callers must treat as poison: ack and do not
    /// retry (spec §4.1, §7).
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|source| {
            tracing::error!(
                error = %source,
                bytes = %String::from_utf8_lossy(&bytes[..bytes.len().min(256)]),
                "failed to decode envelope; treating as poison"
            );
            DecodeError(source)
        })
    }
}

/// Raised when a delivered payload cannot be decoded into an [`Envelope`].
#[derive(Debug, thiserror::Error)]
#[error("failed to decode envelope: {0}")]
pub struct DecodeError(#[source] serde_json::Error);

//─────────────────────────────
//  Bus trait
//─────────────────────────────

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The envelope could not be handed to the transport.
    #[error("failed to publish to topic {topic:?}: {reason}")]
    PublishFailed {
        /// The topic that was being published to.
        topic: String,
        /// Why the publish failed.
        reason: String,
    },
}

/// Publish/subscribe abstraction over a topic-partitioned event stream
/// (spec §4.1). All implementations must be thread-safe and support
/// multiple subscribers per topic.
pub trait EventBus: Send + Sync {
    /// Publish an envelope to the named topic. The envelope's own
    /// `event_id`/`event_type`/`conversation_id` fields serve as the
    /// transport attributes spec §4.1 requires.
    fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), BusError>;

    /// Subscribe to a topic's live event stream. Events published before
    /// subscription are not replayed.
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Envelope>;

    /// Number of live subscribers currently attached to a topic. Used by
    /// tests and the CLI's `health` subcommand, mirroring
    /// `InMemoryBus::subscriber_count`.
    fn subscriber_count(&self, topic: &str) -> usize;
}

//─────────────────────────────
//  In-memory driver
//─────────────────────────────

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Simple in-memory, broadcast-only event bus using Tokio channels, one
/// channel per topic created lazily on first use. Mirrors
/// `toka-bus-core::InMemoryBus`, generalized from a single fixed event
/// stream to per-topic routing.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    capacity: usize,
    topics: Arc<DashMap<String, broadcast::Sender<Envelope>>>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl InMemoryBus {
    /// Create a bus whose per-topic ring buffers hold `capacity` envelopes
    /// before the oldest are dropped for slow subscribers.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Arc::new(DashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Envelope> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl EventBus for InMemoryBus {
    fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), BusError> {
        let sender = self.sender_for(topic);
        // A send error only means there are currently no subscribers; per
        // spec §5 the bus is append-only from the application's
        // perspective and that is not itself a publish failure.
        let _ = sender.send(envelope.clone());
        tracing::debug!(
            topic,
            event_id = %envelope.event_id,
            event_type = ?envelope.event_type,
            conversation_id = %envelope.conversation_id,
            "published envelope"
        );
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Envelope> {
        self.sender_for(topic).subscribe()
    }

    fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|entry| entry.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::{ConversationId, EventId, MessageId};

    fn sample_envelope() -> Envelope {
        Envelope {
            event_id: EventId::new(),
            event_type: EventType::ReasoningRequested,
            conversation_id: ConversationId::new(),
            message_id: MessageId::new(),
            timestamp: Utc::now(),
            producer: Producer::Api,
            payload: Map::new(),
        }
    }

    #[tokio::test]
    async fn publish_then_subscribe_on_same_topic_round_trips() {
        let bus = InMemoryBus::new(16);
        let mut rx = bus.subscribe(TOPIC_REASONING_REQUESTED);
        let envelope = sample_envelope();

        bus.publish(TOPIC_REASONING_REQUESTED, &envelope).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, envelope);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = InMemoryBus::new(16);
        let mut reasoning_rx = bus.subscribe(TOPIC_REASONING_REQUESTED);
        let mut action_rx = bus.subscribe(TOPIC_ACTION_REQUESTED);

        bus.publish(TOPIC_REASONING_REQUESTED, &sample_envelope())
            .unwrap();

        assert!(reasoning_rx.try_recv().is_ok());
        assert!(action_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscriber_count_tracks_live_receivers() {
        let bus = InMemoryBus::new(16);
        assert_eq!(bus.subscriber_count(TOPIC_REASONING_REQUESTED), 0);
        let rx1 = bus.subscribe(TOPIC_REASONING_REQUESTED);
        let rx2 = bus.subscribe(TOPIC_REASONING_REQUESTED);
        assert_eq!(bus.subscriber_count(TOPIC_REASONING_REQUESTED), 2);
        drop(rx1);
        drop(rx2);
    }

    #[test]
    fn envelope_round_trips_through_encode_decode() {
        let envelope = sample_envelope();
        let bytes = envelope.encode();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn decode_of_garbage_bytes_is_a_decode_error() {
        let err = Envelope::decode(b"not json").unwrap_err();
        assert!(err.to_string().contains("failed to decode envelope"));
    }

    #[test]
    fn dead_letter_topic_names_are_distinct_from_live_topics() {
        assert_ne!(TOPIC_REASONING_REQUESTED, TOPIC_REASONING_DEAD_LETTER);
        assert_ne!(TOPIC_ACTION_REQUESTED, TOPIC_ACTION_DEAD_LETTER);
    }
}
