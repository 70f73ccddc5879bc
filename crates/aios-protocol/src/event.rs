//! Session events: the append-only records of a local conversation.
//!
//! Events are never mutated once appended to a session. Correlation data
//! about the remote side (task and context IDs, raw wire payloads) rides in
//! the `metadata` sidecar and is not part of an event's identity.

use crate::content::{Content, FunctionCall, Part};
use crate::ids::{EventId, InvocationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form, namespaced key/value sidecar.
pub type Metadata = Map<String, Value>;

/// Author name reserved for human input.
pub const USER_AUTHOR: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: EventId,
    pub invocation_id: InvocationId,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_tool_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<Value>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl SessionEvent {
    /// Create an empty event with a fresh ID and the current timestamp.
    pub fn new(invocation_id: InvocationId, author: impl Into<String>) -> Self {
        Self {
            id: EventId::new_uuid(),
            invocation_id,
            author: author.into(),
            branch: None,
            timestamp: Utc::now(),
            content: None,
            long_running_tool_ids: Vec::new(),
            error_code: None,
            error_message: None,
            grounding_metadata: None,
            turn_complete: false,
            metadata: Metadata::new(),
        }
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.author == USER_AUTHOR
    }

    /// Parts of the event's content, empty when there is none.
    pub fn parts(&self) -> &[Part] {
        self.content
            .as_ref()
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }

    pub fn has_content(&self) -> bool {
        !self.parts().is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error_code.as_deref().is_some_and(|code| !code.is_empty())
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts().iter().filter_map(Part::as_function_call)
    }

    /// True when any function call in this event was declared long-running.
    pub fn has_long_running_call(&self) -> bool {
        self.function_calls()
            .any(|call| self.long_running_tool_ids.contains(&call.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FunctionResponse;
    use serde_json::json;

    fn event_with(parts: Vec<Part>) -> SessionEvent {
        SessionEvent::new(InvocationId::from_string("inv-1"), "agent")
            .with_content(Content::model(parts))
    }

    #[test]
    fn parts_is_empty_without_content() {
        let event = SessionEvent::new(InvocationId::from_string("inv-1"), USER_AUTHOR);
        assert!(event.parts().is_empty());
        assert!(!event.has_content());
        assert!(event.is_user());
    }

    #[test]
    fn has_error_ignores_empty_code() {
        let mut event = event_with(vec![]);
        assert!(!event.has_error());
        event.error_code = Some(String::new());
        assert!(!event.has_error());
        event.error_code = Some("RATE_LIMIT".into());
        assert!(event.has_error());
    }

    #[test]
    fn long_running_call_requires_matching_id() {
        let mut event = event_with(vec![
            Part::FunctionCall(FunctionCall::new("call-1", "approve", json!({}))),
            Part::FunctionResponse(FunctionResponse::new("call-0", "noop", json!({}))),
        ]);
        assert!(!event.has_long_running_call());
        event.long_running_tool_ids = vec!["call-0".into()];
        assert!(!event.has_long_running_call());
        event.long_running_tool_ids = vec!["call-1".into()];
        assert!(event.has_long_running_call());
    }

    #[test]
    fn serde_skips_empty_sidecars() {
        let event = event_with(vec![Part::text("hi")]);
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("metadata").is_none());
        assert!(value.get("long_running_tool_ids").is_none());
        let back: SessionEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
