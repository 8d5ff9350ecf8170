use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to stamp out the small family of UUID newtypes used throughout the
/// pipeline. Each one is `#[serde(transparent)]`, matching the
/// `toka_types::EntityId` convention: a single-field wrapper that serializes
/// as its inner value, not as `{"0": "..."}`.
macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_newtype!(
    /// Identifies a conversation, the root aggregate of the pipeline.
    ConversationId
);
uuid_newtype!(
    /// Identifies a single user message within a conversation.
    MessageId
);
uuid_newtype!(
    /// Identifies a reasoning intent produced by the Reasoner.
    IntentId
);
uuid_newtype!(
    /// Identifies an action result produced by the Executor.
    ResultId
);
uuid_newtype!(
    /// Identifies one logical event delivery on the bus; also the receipt key.
    EventId
);
