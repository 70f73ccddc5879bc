//! In-process task table for the server: the latest snapshot of each task
//! folded from the events the executor emits, plus abort handles for runs
//! still in flight.

use std::collections::HashMap;
use std::sync::Arc;

use aios_protocol::{
    A2aResult, ContextId, EventQueue, Message, Metadata, Task, TaskId, TaskState, TaskStatus,
    WireEvent,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, Task>>,
    running: Mutex<HashMap<TaskId, AbortHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Record an inbound message in the task's history, creating the task
    /// in the Submitted state if it is new.
    pub fn record_message(&self, task_id: &TaskId, context_id: &ContextId, message: &Message) {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .entry(task_id.clone())
            .or_insert_with(|| empty_task(task_id, context_id));
        task.history.push(message.clone());
    }

    /// Fold one emitted event into the task snapshot.
    pub fn record(&self, event: &WireEvent) {
        let mut tasks = self.tasks.lock();
        match event {
            WireEvent::Task(task) => {
                tasks.insert(task.id.clone(), task.clone());
            }
            WireEvent::StatusUpdate(update) => {
                let task = tasks
                    .entry(update.task_id.clone())
                    .or_insert_with(|| empty_task(&update.task_id, &update.context_id));
                task.status = update.status.clone();
            }
            WireEvent::ArtifactUpdate(update) => {
                let task = tasks
                    .entry(update.task_id.clone())
                    .or_insert_with(|| empty_task(&update.task_id, &update.context_id));
                let existing = task
                    .artifacts
                    .iter_mut()
                    .find(|a| a.artifact_id == update.artifact.artifact_id);
                match existing {
                    Some(artifact) if update.append => {
                        artifact.parts.extend(update.artifact.parts.iter().cloned());
                    }
                    Some(artifact) => *artifact = update.artifact.clone(),
                    None => task.artifacts.push(update.artifact.clone()),
                }
            }
            WireEvent::Message(message) => {
                if let Some(task) = message.task_id.as_ref().and_then(|id| tasks.get_mut(id)) {
                    task.history.push(message.clone());
                }
            }
            WireEvent::Unknown { .. } => {}
        }
    }

    pub fn track(&self, task_id: TaskId, handle: AbortHandle) {
        self.running.lock().insert(task_id, handle);
    }

    pub fn untrack(&self, task_id: &TaskId) {
        self.running.lock().remove(task_id);
    }

    /// Abort the task's run if one is in flight.
    pub fn abort(&self, task_id: &TaskId) -> bool {
        match self.running.lock().remove(task_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

fn empty_task(task_id: &TaskId, context_id: &ContextId) -> Task {
    Task {
        id: task_id.clone(),
        context_id: context_id.clone(),
        status: TaskStatus::new(TaskState::Submitted, None),
        artifacts: Vec::new(),
        history: Vec::new(),
        metadata: Metadata::new(),
    }
}

/// Forwards events to another queue after folding them into the registry.
pub struct RecordingQueue<Q> {
    registry: Arc<TaskRegistry>,
    inner: Q,
}

impl<Q> RecordingQueue<Q> {
    pub fn new(registry: Arc<TaskRegistry>, inner: Q) -> Self {
        Self { registry, inner }
    }

    pub fn into_inner(self) -> Q {
        self.inner
    }
}

#[async_trait]
impl<Q: EventQueue> EventQueue for RecordingQueue<Q> {
    async fn write(&self, event: WireEvent) -> A2aResult<()> {
        self.registry.record(&event);
        self.inner.write(event).await
    }
}
