//! A2A wire model: messages, tasks, and the streamed update events.
//!
//! JSON shape follows the A2A protocol: a `kind` discriminator on events and
//! parts, camelCase fields, base64 file bytes.
//!
//! Forward-compatible: an event whose `kind` is not one of the four known
//! kinds deserializes into `WireEvent::Unknown` instead of failing. A known
//! kind with a malformed body is still a deserialization error.

use crate::event::Metadata;
use crate::ids::{ArtifactId, ContextId, MessageId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Parts ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WirePart {
    Text(TextPart),
    File(FilePart),
    Data(DataPart),
}

impl WirePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart {
            text: text.into(),
            metadata: Metadata::new(),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Text(part) => &part.metadata,
            Self::File(part) => &part.metadata,
            Self::Data(part) => &part.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePart {
    pub file: FileContent,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

/// File payload: inline base64 bytes or a URI reference, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    #[serde(rename_all = "camelCase")]
    Bytes {
        bytes: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Uri {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPart {
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

// ─── Messages and tasks ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: MessageId,
    pub role: MessageRole,
    #[serde(default)]
    pub parts: Vec<WirePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl Message {
    pub fn new(role: MessageRole, parts: Vec<WirePart>) -> Self {
        Self {
            message_id: MessageId::new_uuid(),
            role,
            parts,
            task_id: None,
            context_id: None,
            metadata: Metadata::new(),
        }
    }

    /// A message addressed to an existing task.
    pub fn for_task(role: MessageRole, task: &TaskRef, parts: Vec<WirePart>) -> Self {
        let mut message = Self::new(role, parts);
        message.task_id = Some(task.task_id.clone());
        message.context_id = Some(task.context_id.clone());
        message
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::InputRequired | Self::Completed | Self::Failed | Self::Canceled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            message,
            timestamp: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: ArtifactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl Artifact {
    pub fn new(artifact_id: ArtifactId, parts: Vec<WirePart>) -> Self {
        Self {
            artifact_id,
            name: None,
            parts,
            metadata: Metadata::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl Task {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            task_id: self.id.clone(),
            context_id: self.context_id.clone(),
        }
    }
}

/// The (task, context) pair every update event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub task_id: TaskId,
    pub context_id: ContextId,
}

// ─── Streamed events ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl TaskStatusUpdateEvent {
    pub fn new(task: &TaskRef, state: TaskState, message: Option<Message>) -> Self {
        Self {
            task_id: task.task_id.clone(),
            context_id: task.context_id.clone(),
            status: TaskStatus::new(state, message),
            is_final: false,
            metadata: Metadata::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub artifact: Artifact,
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub last_chunk: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

impl TaskArtifactUpdateEvent {
    /// First chunk of a new artifact; allocates a fresh artifact ID.
    pub fn new_artifact(task: &TaskRef, parts: Vec<WirePart>) -> Self {
        Self {
            task_id: task.task_id.clone(),
            context_id: task.context_id.clone(),
            artifact: Artifact::new(ArtifactId::new_uuid(), parts),
            append: false,
            last_chunk: false,
            metadata: Metadata::new(),
        }
    }

    /// A chunk appended to an artifact that was already started.
    pub fn append_to(task: &TaskRef, artifact_id: ArtifactId, parts: Vec<WirePart>) -> Self {
        Self {
            task_id: task.task_id.clone(),
            context_id: task.context_id.clone(),
            artifact: Artifact::new(artifact_id, parts),
            append: true,
            last_chunk: false,
            metadata: Metadata::new(),
        }
    }
}

/// Discriminated union of everything a peer can stream back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum WireEvent {
    #[serde(rename = "message")]
    Message(Message),
    #[serde(rename = "task")]
    Task(Task),
    #[serde(rename = "status-update")]
    StatusUpdate(TaskStatusUpdateEvent),
    #[serde(rename = "artifact-update")]
    ArtifactUpdate(TaskArtifactUpdateEvent),
    /// Forward-compatible catch-all for kinds this build does not know.
    #[serde(rename = "unknown")]
    Unknown { event_kind: String, data: Value },
}

impl WireEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Task(_) => "task",
            Self::StatusUpdate(_) => "status-update",
            Self::ArtifactUpdate(_) => "artifact-update",
            Self::Unknown { event_kind, .. } => event_kind,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Message(message) => message.task_id.as_ref(),
            Self::Task(task) => Some(&task.id),
            Self::StatusUpdate(update) => Some(&update.task_id),
            Self::ArtifactUpdate(update) => Some(&update.task_id),
            Self::Unknown { .. } => None,
        }
    }
}

impl From<TaskStatusUpdateEvent> for WireEvent {
    fn from(event: TaskStatusUpdateEvent) -> Self {
        Self::StatusUpdate(event)
    }
}

impl From<TaskArtifactUpdateEvent> for WireEvent {
    fn from(event: TaskArtifactUpdateEvent) -> Self {
        Self::ArtifactUpdate(event)
    }
}

// ─── Forward-compatible deserializer ───────────────────────────────

/// Mirrors the known `WireEvent` variants but derives Deserialize.
#[derive(Deserialize)]
#[serde(tag = "kind")]
enum WireEventKnown {
    #[serde(rename = "message")]
    Message(Message),
    #[serde(rename = "task")]
    Task(Task),
    #[serde(rename = "status-update")]
    StatusUpdate(TaskStatusUpdateEvent),
    #[serde(rename = "artifact-update")]
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

const KNOWN_KINDS: [&str; 4] = ["message", "task", "status-update", "artifact-update"];

impl<'de> Deserialize<'de> for WireEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let kind = raw
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            let mut data = raw;
            if let Some(obj) = data.as_object_mut() {
                obj.remove("kind");
            }
            return Ok(Self::Unknown {
                event_kind: kind,
                data,
            });
        }
        let known = serde_json::from_value::<WireEventKnown>(raw).map_err(serde::de::Error::custom)?;
        Ok(match known {
            WireEventKnown::Message(message) => Self::Message(message),
            WireEventKnown::Task(task) => Self::Task(task),
            WireEventKnown::StatusUpdate(update) => Self::StatusUpdate(update),
            WireEventKnown::ArtifactUpdate(update) => Self::ArtifactUpdate(update),
        })
    }
}

/// Per-request delivery options attached to `message/stream` calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_output_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MessageSendConfiguration>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_ref() -> TaskRef {
        TaskRef {
            task_id: TaskId::from_string("t1"),
            context_id: ContextId::from_string("c1"),
        }
    }

    #[test]
    fn status_update_serializes_with_kind_and_final() {
        let mut event = TaskStatusUpdateEvent::new(&task_ref(), TaskState::InputRequired, None);
        event.status.timestamp = None;
        event.is_final = true;
        let value = serde_json::to_value(WireEvent::from(event)).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "status-update",
                "taskId": "t1",
                "contextId": "c1",
                "status": {"state": "input-required"},
                "final": true
            })
        );
    }

    #[test]
    fn parts_use_kind_discriminator() {
        let value = serde_json::to_value(WirePart::text("hi")).unwrap();
        assert_eq!(value, json!({"kind": "text", "text": "hi"}));

        let file: WirePart = serde_json::from_value(json!({
            "kind": "file",
            "file": {"uri": "gs://bucket/a.png", "mimeType": "image/png"}
        }))
        .unwrap();
        assert!(matches!(
            file,
            WirePart::File(FilePart { file: FileContent::Uri { ref uri, .. }, .. }) if uri == "gs://bucket/a.png"
        ));

        let bytes: WirePart = serde_json::from_value(json!({
            "kind": "file",
            "file": {"bytes": "aGk=", "name": "hi.txt"}
        }))
        .unwrap();
        assert!(matches!(
            bytes,
            WirePart::File(FilePart { file: FileContent::Bytes { .. }, .. })
        ));
    }

    #[test]
    fn unknown_kind_becomes_unknown_variant() {
        let event: WireEvent =
            serde_json::from_value(json!({"kind": "push-config", "taskId": "t1"})).unwrap();
        match event {
            WireEvent::Unknown { event_kind, data } => {
                assert_eq!(event_kind, "push-config");
                assert_eq!(data["taskId"], "t1");
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn malformed_known_kind_is_an_error() {
        let result = serde_json::from_value::<WireEvent>(json!({"kind": "task", "id": 7}));
        assert!(result.is_err());
    }

    #[test]
    fn artifact_update_roundtrip() {
        let event = WireEvent::from(TaskArtifactUpdateEvent::append_to(
            &task_ref(),
            ArtifactId::from_string("a1"),
            vec![WirePart::text("chunk")],
        ));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"artifact-update\""));
        let back: WireEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.task_id().map(TaskId::as_str), Some("t1"));
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskState::Working.is_terminal());
        assert!(TaskState::InputRequired.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
    }
}
