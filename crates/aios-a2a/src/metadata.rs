//! Correlation metadata riding on both sides of the bridge.
//!
//! Session events carry `a2a:`-namespaced keys that point back at remote task
//! state. Wire events carry `aios_`-namespaced keys that point back at the
//! local invocation. Both are lookup sidecars only.

use aios_protocol::{ContextId, Metadata, SessionEvent, SessionId, TaskId};
use serde_json::Value;

pub const SESSION_META_PREFIX: &str = "a2a:";
pub const TASK_ID_KEY: &str = "a2a:task_id";
pub const CONTEXT_ID_KEY: &str = "a2a:context_id";
pub const REQUEST_KEY: &str = "a2a:request";
pub const RESPONSE_KEY: &str = "a2a:response";
pub const ERROR_KEY: &str = "a2a:error";

pub const WIRE_META_PREFIX: &str = "aios_";
pub const APP_NAME_KEY: &str = "aios_app_name";
pub const USER_ID_KEY: &str = "aios_user_id";
pub const SESSION_ID_KEY: &str = "aios_session_id";
pub const INVOCATION_ID_KEY: &str = "aios_invocation_id";
pub const AUTHOR_KEY: &str = "aios_author";
pub const BRANCH_KEY: &str = "aios_branch";
pub const ERROR_CODE_KEY: &str = "aios_error_code";
pub const GROUNDING_METADATA_KEY: &str = "aios_grounding_metadata";

/// Prefix used to derive the local user of an A2A context.
pub const A2A_USER_PREFIX: &str = "A2A_USER_";

pub fn session_meta_key(key: &str) -> String {
    format!("{SESSION_META_PREFIX}{key}")
}

pub fn wire_meta_key(key: &str) -> String {
    format!("{WIRE_META_PREFIX}{key}")
}

/// Remote task coordinates recovered from a session event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: Option<TaskId>,
    pub context_id: Option<ContextId>,
}

/// Build the task/context sidecar. Absent or empty IDs are left out.
pub fn correlation_metadata(task_id: Option<&TaskId>, context_id: Option<&ContextId>) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(task_id) = task_id.filter(|id| !id.is_empty()) {
        metadata.insert(TASK_ID_KEY.into(), Value::String(task_id.to_string()));
    }
    if let Some(context_id) = context_id.filter(|id| !id.is_empty()) {
        metadata.insert(CONTEXT_ID_KEY.into(), Value::String(context_id.to_string()));
    }
    metadata
}

pub fn task_info(event: &SessionEvent) -> TaskInfo {
    let read = |key: &str| {
        event
            .metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    TaskInfo {
        task_id: read(TASK_ID_KEY).map(TaskId::from),
        context_id: read(CONTEXT_ID_KEY).map(ContextId::from),
    }
}

/// Local identity derived for one server-side invocation.
///
/// The A2A context maps onto a local session: user `A2A_USER_<context>`,
/// session `<context>`. `metadata` is the base set attached to lifecycle
/// events (app, user and session).
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationMeta {
    pub user_id: String,
    pub session_id: SessionId,
    pub metadata: Metadata,
}

impl InvocationMeta {
    pub fn new(app_name: &str, context_id: &ContextId) -> Self {
        let user_id = format!("{A2A_USER_PREFIX}{context_id}");
        let session_id = SessionId::from_string(context_id.as_str());
        let mut metadata = Metadata::new();
        metadata.insert(APP_NAME_KEY.into(), Value::String(app_name.to_owned()));
        metadata.insert(USER_ID_KEY.into(), Value::String(user_id.clone()));
        metadata.insert(SESSION_ID_KEY.into(), Value::String(session_id.to_string()));
        Self {
            user_id,
            session_id,
            metadata,
        }
    }

    /// Base metadata extended with the per-event fields that are present.
    pub fn event_metadata(&self, event: &SessionEvent) -> Metadata {
        let mut metadata = self.metadata.clone();
        let mut put = |key: &str, value: &str| {
            if !value.is_empty() {
                metadata.insert(key.into(), Value::String(value.to_owned()));
            }
        };
        put(INVOCATION_ID_KEY, event.invocation_id.as_str());
        put(AUTHOR_KEY, &event.author);
        put(BRANCH_KEY, event.branch.as_deref().unwrap_or_default());
        put(ERROR_CODE_KEY, event.error_code.as_deref().unwrap_or_default());
        if let Some(grounding) = &event.grounding_metadata {
            metadata.insert(GROUNDING_METADATA_KEY.into(), grounding.clone());
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aios_protocol::InvocationId;
    use serde_json::json;

    #[test]
    fn correlation_roundtrips_through_event_metadata() {
        let mut event = SessionEvent::new(InvocationId::from_string("inv"), "peer");
        event.metadata = correlation_metadata(
            Some(&TaskId::from_string("t-1")),
            Some(&ContextId::from_string("ctx-1")),
        );
        assert_eq!(
            task_info(&event),
            TaskInfo {
                task_id: Some(TaskId::from_string("t-1")),
                context_id: Some(ContextId::from_string("ctx-1")),
            }
        );
    }

    #[test]
    fn empty_ids_are_not_recorded() {
        let metadata = correlation_metadata(Some(&TaskId::from_string("")), None);
        assert!(metadata.is_empty());

        let mut event = SessionEvent::new(InvocationId::from_string("inv"), "peer");
        event.metadata.insert(CONTEXT_ID_KEY.into(), json!(""));
        assert_eq!(task_info(&event), TaskInfo::default());
    }

    #[test]
    fn invocation_meta_derives_user_and_session() {
        let meta = InvocationMeta::new("weather", &ContextId::from_string("ctx-9"));
        assert_eq!(meta.user_id, "A2A_USER_ctx-9");
        assert_eq!(meta.session_id.as_str(), "ctx-9");
        assert_eq!(meta.metadata[APP_NAME_KEY], "weather");
        assert_eq!(meta.metadata[USER_ID_KEY], "A2A_USER_ctx-9");
        assert_eq!(meta.metadata[SESSION_ID_KEY], "ctx-9");
    }

    #[test]
    fn event_metadata_adds_present_fields_only() {
        let meta = InvocationMeta::new("app", &ContextId::from_string("c"));
        let mut event = SessionEvent::new(InvocationId::from_string("inv-2"), "planner");
        let base = meta.event_metadata(&event);
        assert_eq!(base[INVOCATION_ID_KEY], "inv-2");
        assert_eq!(base[AUTHOR_KEY], "planner");
        assert!(!base.contains_key(BRANCH_KEY));
        assert!(!base.contains_key(ERROR_CODE_KEY));

        event.branch = Some("root.planner".into());
        event.error_code = Some("SAFETY".into());
        event.grounding_metadata = Some(json!({"sources": ["a"]}));
        let full = meta.event_metadata(&event);
        assert_eq!(full[BRANCH_KEY], "root.planner");
        assert_eq!(full[ERROR_CODE_KEY], "SAFETY");
        assert_eq!(full[GROUNDING_METADATA_KEY], json!({"sources": ["a"]}));
    }

    #[test]
    fn key_helpers_prefix_namespaces() {
        assert_eq!(session_meta_key("request"), REQUEST_KEY);
        assert_eq!(wire_meta_key("author"), AUTHOR_KEY);
    }
}
