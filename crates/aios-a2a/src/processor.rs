//! Per-invocation state for the server role: artifact identity and the
//! pending terminal status.

use std::fmt;

use aios_protocol::{
    A2aResult, ArtifactId, Message, MessageRole, Metadata, SessionEvent, TaskArtifactUpdateEvent,
    TaskRef, TaskState, TaskStatusUpdateEvent, WireEvent, WirePart,
};
use tracing::debug;

use crate::codec;
use crate::metadata::InvocationMeta;

/// Turns local session events into artifact updates for one task.
///
/// Terminal statuses are held back until the run ends so the whole response
/// lands in the artifact before the task closes. Failed is first-wins and
/// outranks InputRequired, which is last-wins.
#[derive(Debug)]
pub struct EventProcessor {
    task: TaskRef,
    meta: InvocationMeta,
    artifact_id: Option<ArtifactId>,
    failed: Option<TaskStatusUpdateEvent>,
    input_required: Option<TaskStatusUpdateEvent>,
}

impl EventProcessor {
    pub fn new(task: TaskRef, meta: InvocationMeta) -> Self {
        Self {
            task,
            meta,
            artifact_id: None,
            failed: None,
            input_required: None,
        }
    }

    pub fn meta(&self) -> &InvocationMeta {
        &self.meta
    }

    /// Process one local event. Returns the artifact update to emit, if any.
    pub fn process(&mut self, event: &SessionEvent) -> A2aResult<Option<TaskArtifactUpdateEvent>> {
        let metadata = self.meta.event_metadata(event);

        if event.has_error() && self.failed.is_none() {
            let message = event.error_message.as_deref().unwrap_or_default();
            let cause = format!("llm error response: {message:?}");
            debug!(error_code = ?event.error_code, "task will fail");
            self.failed = Some(task_failed_event(&self.task, cause, metadata.clone()));
        }

        if !event.has_content() {
            return Ok(None);
        }

        if event.has_long_running_call() {
            let mut update = TaskStatusUpdateEvent::new(&self.task, TaskState::InputRequired, None);
            update.is_final = true;
            update.metadata = metadata.clone();
            self.input_required = Some(update);
        }

        let parts = codec::encode(event.parts(), &event.long_running_tool_ids)?;
        let mut update = match &self.artifact_id {
            None => {
                let update = TaskArtifactUpdateEvent::new_artifact(&self.task, parts);
                self.artifact_id = Some(update.artifact.artifact_id.clone());
                update
            }
            Some(artifact_id) => {
                TaskArtifactUpdateEvent::append_to(&self.task, artifact_id.clone(), parts)
            }
        };
        update.metadata = metadata;
        Ok(Some(update))
    }

    /// Events that close the invocation after a normal end of the run: an
    /// empty last chunk if an artifact was started, then exactly one terminal
    /// status chosen as Failed, else InputRequired, else Completed.
    pub fn finish(self) -> Vec<WireEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(artifact_id) = self.artifact_id {
            let mut last = TaskArtifactUpdateEvent::append_to(&self.task, artifact_id, Vec::new());
            last.last_chunk = true;
            events.push(last.into());
        }
        let terminal = self.failed.or(self.input_required).unwrap_or_else(|| {
            let mut completed = TaskStatusUpdateEvent::new(&self.task, TaskState::Completed, None);
            completed.is_final = true;
            completed.metadata = self.meta.metadata.clone();
            completed
        });
        events.push(terminal.into());
        events
    }

    /// A Failed status for an error that ends the run early. Carries the
    /// event's metadata when the failure is tied to one.
    pub fn failed_event(
        &self,
        cause: impl fmt::Display,
        event: Option<&SessionEvent>,
    ) -> TaskStatusUpdateEvent {
        let metadata = match event {
            Some(event) => self.meta.event_metadata(event),
            None => self.meta.metadata.clone(),
        };
        task_failed_event(&self.task, cause, metadata)
    }
}

/// Final Failed status with an agent message holding the cause as text.
pub fn task_failed_event(
    task: &TaskRef,
    cause: impl fmt::Display,
    metadata: Metadata,
) -> TaskStatusUpdateEvent {
    let message = Message::for_task(
        MessageRole::Agent,
        task,
        vec![WirePart::text(cause.to_string())],
    );
    let mut update = TaskStatusUpdateEvent::new(task, TaskState::Failed, Some(message));
    update.is_final = true;
    update.metadata = metadata;
    update
}
