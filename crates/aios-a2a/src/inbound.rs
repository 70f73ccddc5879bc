//! Wire events received from a peer, translated into session events.

use aios_protocol::{
    A2aError, A2aResult, Content, Message, MessageRole, Role, SessionEvent, Task,
    TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent, USER_AUTHOR, WireEvent,
};
use tracing::debug;

use crate::codec::{self, DecodedParts};
use crate::context::InvocationContext;
use crate::metadata::correlation_metadata;

/// Translate one inbound wire event. `Ok(None)` means the event carries
/// nothing worth recording.
pub fn to_session_event(
    ctx: &InvocationContext,
    event: &WireEvent,
) -> A2aResult<Option<SessionEvent>> {
    match event {
        WireEvent::Message(message) => message_to_event(ctx, message).map(Some),
        WireEvent::Task(task) => task_to_event(ctx, task).map(Some),
        WireEvent::ArtifactUpdate(update) => artifact_update_to_event(ctx, update),
        WireEvent::StatusUpdate(update) if update.is_final => {
            final_status_to_event(ctx, update).map(Some)
        }
        WireEvent::StatusUpdate(update) => status_update_to_event(ctx, update),
        WireEvent::Unknown { event_kind, .. } => {
            Err(A2aError::UnknownEventKind(event_kind.clone()))
        }
    }
}

/// Convert a session event into a wire message: user-authored events become
/// user messages, everything else an agent message.
pub fn event_to_message(event: &SessionEvent) -> A2aResult<Message> {
    let parts = codec::encode(event.parts(), &event.long_running_tool_ids)?;
    let role = if event.is_user() {
        MessageRole::User
    } else {
        MessageRole::Agent
    };
    Ok(Message::new(role, parts))
}

fn message_to_event(ctx: &InvocationContext, message: &Message) -> A2aResult<SessionEvent> {
    let decoded = codec::decode(&message.parts)?;
    let mut event = ctx.new_event();
    let role = match message.role {
        MessageRole::User => {
            event.author = USER_AUTHOR.to_owned();
            Role::User
        }
        MessageRole::Agent => Role::Model,
    };
    if !decoded.parts.is_empty() {
        event.content = Some(Content::new(role, decoded.parts));
    }
    event.metadata = correlation_metadata(message.task_id.as_ref(), message.context_id.as_ref());
    Ok(event)
}

fn task_to_event(ctx: &InvocationContext, task: &Task) -> A2aResult<SessionEvent> {
    let mut collected = DecodedParts::default();
    let status_parts = task.status.message.iter().map(|message| &message.parts);
    for parts in task.artifacts.iter().map(|a| &a.parts).chain(status_parts) {
        let decoded = codec::decode(parts)?;
        collected.parts.extend(decoded.parts);
        collected.long_running_ids.extend(decoded.long_running_ids);
    }

    let mut event = ctx.new_event();
    if !collected.parts.is_empty() {
        event.content = Some(Content::model(collected.parts));
    }
    event.metadata = correlation_metadata(Some(&task.id), Some(&task.context_id));
    if task.status.state == TaskState::InputRequired {
        event.long_running_tool_ids = collected.long_running_ids;
    }
    Ok(event)
}

fn artifact_update_to_event(
    ctx: &InvocationContext,
    update: &TaskArtifactUpdateEvent,
) -> A2aResult<Option<SessionEvent>> {
    if update.artifact.parts.is_empty() {
        debug!(task_id = %update.task_id, "skipping empty artifact update");
        return Ok(None);
    }
    let decoded = codec::decode(&update.artifact.parts)?;
    let mut event = ctx.new_event();
    event.content = Some(Content::model(decoded.parts));
    event.long_running_tool_ids = decoded.long_running_ids;
    event.metadata = correlation_metadata(Some(&update.task_id), Some(&update.context_id));
    Ok(Some(event))
}

/// Interim status messages are progress chatter, so every part becomes a thought.
fn status_update_to_event(
    ctx: &InvocationContext,
    update: &TaskStatusUpdateEvent,
) -> A2aResult<Option<SessionEvent>> {
    let Some(message) = &update.status.message else {
        return Ok(None);
    };
    let mut event = message_to_event(ctx, message)?;
    event.metadata = correlation_metadata(Some(&update.task_id), Some(&update.context_id));
    let Some(content) = event.content.as_mut() else {
        return Ok(None);
    };
    content.parts.iter_mut().for_each(|part| part.mark_thought());
    Ok(Some(event))
}

fn final_status_to_event(
    ctx: &InvocationContext,
    update: &TaskStatusUpdateEvent,
) -> A2aResult<SessionEvent> {
    let mut event = ctx.new_event();
    if let Some(message) = &update.status.message {
        let decoded = codec::decode(&message.parts)?;
        if !decoded.parts.is_empty() {
            event.content = Some(Content::model(decoded.parts));
        }
    }
    event.metadata = correlation_metadata(Some(&update.task_id), Some(&update.context_id));
    event.turn_complete = true;
    Ok(event)
}
