//! Works out what part of the local session a remote peer has not seen yet.
//!
//! The log is walked by index from the end. Everything after the peer's last
//! reply is unseen. Turns by third-party agents are re-presented as user
//! context, since the peer only knows a user and itself. A user answering
//! one of the peer's own function calls short-circuits all of this and
//! resumes the peer's task directly.

use aios_protocol::{
    A2aResult, ContextId, Message, MessageRole, Part, SessionEvent, TaskId, WirePart,
};
use tracing::warn;

use crate::codec;
use crate::inbound::event_to_message;
use crate::metadata::task_info;

pub const CONTEXT_MARKER: &str = "For context:";

/// Parts to send plus the remote coordinates they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryDiff {
    pub parts: Vec<WirePart>,
    pub role: Option<MessageRole>,
    pub task_id: Option<TaskId>,
    pub context_id: Option<ContextId>,
}

impl HistoryDiff {
    /// Nothing to send; callers must not contact the peer.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_message(self) -> Message {
        let mut message = Message::new(self.role.unwrap_or(MessageRole::User), self.parts);
        message.task_id = self.task_id;
        message.context_id = self.context_id;
        message
    }
}

/// Compute the outbound diff for the peer known locally as `remote_author`.
pub fn diff_history(events: &[SessionEvent], remote_author: &str) -> A2aResult<HistoryDiff> {
    if let Some(diff) = continuation(events, remote_author)? {
        return Ok(diff);
    }

    let last_remote = events.iter().rposition(|event| event.author == remote_author);
    let context_id = last_remote.and_then(|index| task_info(&events[index]).context_id);
    let unseen = last_remote.map_or(0, |index| index + 1);

    let mut parts = Vec::new();
    for event in &events[unseen..] {
        let encoded = if event.is_user() || event.author == remote_author {
            if !event.has_content() {
                continue;
            }
            codec::encode(event.parts(), &event.long_running_tool_ids)
        } else {
            let Some(context) = present_as_user_context(event) else {
                continue;
            };
            codec::encode(&context, &[])
        };
        match encoded {
            Ok(encoded) => parts.extend(encoded),
            Err(error) => warn!(event_id = %event.id, %error, "skipping unencodable history event"),
        }
    }

    Ok(HistoryDiff {
        parts,
        role: Some(MessageRole::User),
        task_id: None,
        context_id,
    })
}

/// The last event is the user's function response to a call the peer made.
fn continuation(events: &[SessionEvent], remote_author: &str) -> A2aResult<Option<HistoryDiff>> {
    let Some((last, earlier)) = events.split_last() else {
        return Ok(None);
    };
    if !last.is_user() {
        return Ok(None);
    }
    let Some(call_id) = last.parts().iter().find_map(Part::as_function_response).map(|r| &r.id)
    else {
        return Ok(None);
    };
    let Some(call_event) = earlier.iter().rev().find(|event| {
        event.author == remote_author && event.function_calls().any(|call| &call.id == call_id)
    }) else {
        return Ok(None);
    };

    let message = event_to_message(last)?;
    let info = task_info(call_event);
    Ok(Some(HistoryDiff {
        parts: message.parts,
        role: Some(message.role),
        task_id: info.task_id,
        context_id: info.context_id,
    }))
}

/// Rewrite another agent's turn as plain-text context credited to its author.
/// Thoughts are dropped; `None` when nothing but the marker would remain.
fn present_as_user_context(event: &SessionEvent) -> Option<Vec<Part>> {
    let author = &event.author;
    let mut parts = vec![Part::text(CONTEXT_MARKER)];
    for part in event.parts() {
        let rewritten = match part {
            Part::Text { thought: true, .. } => continue,
            Part::Text { text, .. } if !text.is_empty() => {
                Part::text(format!("[{author}] said: {text}"))
            }
            Part::FunctionCall(call) => Part::text(format!(
                "[{author}] called tool {} with parameters: {}",
                call.name, call.args
            )),
            Part::FunctionResponse(response) => Part::text(format!(
                "[{author}] {} tool returned result: {}",
                response.name, response.response
            )),
            other => other.clone(),
        };
        parts.push(rewritten);
    }
    (parts.len() > 1).then_some(parts)
}
