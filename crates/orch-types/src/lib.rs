#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-types** – Shared primitive data structures for the agent pipeline
//! orchestrator.
//!
//! This crate sits at the bottom of the dependency graph (mirroring
//! `toka-types` in the wider Toka workspace) so every other crate can depend
//! on it without risking a cycle. It makes no assumptions about I/O,
//! transport, or storage — those live in `orch-bus` and `orch-store`.

mod ids;
mod conversation;
mod message;
mod intent;
mod action;
mod result;
mod event;
mod receipt;
mod idempotency;

pub use ids::{ConversationId, EventId, IntentId, MessageId, ResultId};
pub use conversation::{Conversation, ConversationState};
pub use message::UserMessage;
pub use intent::ReasoningIntent;
pub use action::Action;
pub use result::ActionResult;
pub use event::{EventLogEntry, EventType, Producer};
pub use receipt::{Receipt, ReceiptStatus};
pub use idempotency::IdempotencyKeyRecord;
