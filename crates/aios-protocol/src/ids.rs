//! Typed ID wrappers shared by the session model and the A2A wire model.
//!
//! IDs are opaque String wrappers (serde-transparent). Remote peers choose
//! their own formats, so nothing here assumes UUIDs beyond `new_uuid`.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a session event.
    EventId
);
typed_id!(
    /// Identifier shared by every event produced during one agent invocation.
    InvocationId
);
typed_id!(
    /// Identifier of a local session, unique per (app, user).
    SessionId
);
typed_id!(
    /// Identifier of a remote task.
    TaskId
);
typed_id!(
    /// Identifier grouping tasks and messages into one remote conversation.
    ContextId
);
typed_id!(
    /// Identifier of a streamed artifact within a task.
    ArtifactId
);
typed_id!(
    /// Identifier of a wire message.
    MessageId
);
