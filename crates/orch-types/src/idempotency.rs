use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MessageId;

/// Records which message first claimed a client-supplied idempotency key.
/// Immutable once written (spec §3, §4.3: "Never overwrites").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyKeyRecord {
    /// The client-supplied key, used as the storage key.
    pub key: String,
    /// The message that first claimed this key.
    pub message_id: MessageId,
    /// When the key was claimed.
    pub created_at: DateTime<Utc>,
}
