//! Server role: run a local agent for an inbound A2A request and report it
//! as a task lifecycle.

use std::sync::Arc;

use aios_protocol::{
    A2aError, A2aResult, AgentRunner, Content, ContextId, EventQueue, Message, Metadata,
    RunConfig, RunRequest, SessionKey, SessionService, Task, TaskId, TaskRef, TaskState,
    TaskStatusUpdateEvent, WireEvent,
};
use futures_util::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::codec;
use crate::metadata::InvocationMeta;
use crate::processor::{EventProcessor, task_failed_event};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub app_name: String,
    pub run_config: RunConfig,
}

impl ExecutorConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            run_config: RunConfig::default(),
        }
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }
}

/// What the transport layer knows about one inbound call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub message: Option<Message>,
    /// The task this call continues, if the peer referenced one we know.
    pub stored_task: Option<Task>,
}

impl RequestContext {
    pub fn new(task_id: TaskId, context_id: ContextId, message: Option<Message>) -> Self {
        Self {
            task_id,
            context_id,
            message,
            stored_task: None,
        }
    }

    pub fn with_stored_task(mut self, task: Task) -> Self {
        self.stored_task = Some(task);
        self
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
        }
    }
}

/// Runs the local agent and writes the task lifecycle to a queue:
/// Submitted (new tasks only), Working, artifact chunks, then one terminal
/// status. Failures are reported as a Failed status; only queue write
/// failures are returned as errors.
pub struct Executor {
    config: ExecutorConfig,
    runner: Arc<dyn AgentRunner>,
    sessions: Arc<dyn SessionService>,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        runner: Arc<dyn AgentRunner>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            config,
            runner,
            sessions,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[instrument(
        skip(self, request, queue),
        fields(task_id = %request.task_id, context_id = %request.context_id)
    )]
    pub async fn execute(&self, request: &RequestContext, queue: &dyn EventQueue) -> A2aResult<()> {
        let Some(message) = &request.message else {
            return Err(A2aError::InvalidRequest("message not provided".into()));
        };
        let task = request.task_ref();

        if request.stored_task.is_none() {
            write(queue, status(&task, TaskState::Submitted, Metadata::new())).await?;
        }

        let meta = InvocationMeta::new(&self.config.app_name, &request.context_id);

        let content = match codec::decode(&message.parts) {
            Ok(decoded) => Content::user(decoded.parts),
            Err(error) => {
                let cause = format!("a2a message conversion failed: {error}");
                return write(queue, task_failed_event(&task, cause, meta.metadata.clone())).await;
            }
        };

        if let Err(error) = self.prepare_session(&meta).await {
            warn!(%error, "session preparation failed");
            return write(queue, task_failed_event(&task, error, meta.metadata.clone())).await;
        }

        write(queue, status(&task, TaskState::Working, meta.metadata.clone())).await?;

        let run = RunRequest {
            app_name: self.config.app_name.clone(),
            user_id: meta.user_id.clone(),
            session_id: meta.session_id.clone(),
            content,
            config: self.config.run_config.clone(),
        };
        let mut processor = EventProcessor::new(task, meta);
        let mut events = match self.runner.run(run).await {
            Ok(events) => events,
            Err(error) => {
                let failed = processor.failed_event(run_failure(error), None);
                return write(queue, failed).await;
            }
        };

        while let Some(next) = events.next().await {
            let event = match next {
                Ok(event) => event,
                Err(error) => {
                    let failed = processor.failed_event(run_failure(error), None);
                    return write(queue, failed).await;
                }
            };
            match processor.process(&event) {
                Ok(Some(update)) => write(queue, update).await?,
                Ok(None) => {}
                Err(error) => {
                    let failed =
                        processor.failed_event(format!("processor failed: {error}"), Some(&event));
                    return write(queue, failed).await;
                }
            }
        }

        for event in processor.finish() {
            write(queue, event).await?;
        }
        info!("invocation finished");
        Ok(())
    }

    /// Report the task as canceled. A task must exist.
    #[instrument(skip(self, request, queue), fields(task_id = %request.task_id))]
    pub async fn cancel(&self, request: &RequestContext, queue: &dyn EventQueue) -> A2aResult<()> {
        if request.stored_task.is_none() {
            return Err(A2aError::InvalidRequest(format!(
                "task {} not found",
                request.task_id
            )));
        }
        let mut canceled = status(&request.task_ref(), TaskState::Canceled, Metadata::new());
        canceled.is_final = true;
        write(queue, canceled).await
    }

    /// Get-or-create the local session for this context.
    async fn prepare_session(&self, meta: &InvocationMeta) -> A2aResult<()> {
        let key = SessionKey::new(
            self.config.app_name.clone(),
            meta.user_id.clone(),
            meta.session_id.clone(),
        );
        match self.sessions.get(&key).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(error) => debug!(%error, "session lookup failed, creating"),
        }
        self.sessions
            .create(key, Metadata::new())
            .await
            .map(|_| ())
            .map_err(|e| A2aError::Session(format!("failed to create a session: {e}")))
    }
}

fn status(task: &TaskRef, state: TaskState, metadata: Metadata) -> TaskStatusUpdateEvent {
    let mut update = TaskStatusUpdateEvent::new(task, state, None);
    update.metadata = metadata;
    update
}

fn run_failure(error: A2aError) -> A2aError {
    match error {
        A2aError::Run(_) => error,
        other => A2aError::Run(other.to_string()),
    }
}

async fn write(queue: &dyn EventQueue, event: impl Into<WireEvent>) -> A2aResult<()> {
    queue.write(event.into()).await.map_err(|e| match e {
        A2aError::Sink(_) => e,
        other => A2aError::Sink(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{APP_NAME_KEY, USER_ID_KEY};
    use crate::queue::CollectingEventQueue;
    use aios_events::InMemorySessionService;
    use aios_protocol::{
        FunctionCall, InvocationId, MessageRole, Part, Session, SessionEvent, SessionEventStream,
        TaskStatus, WirePart,
    };
    use async_trait::async_trait;
    use futures_util::stream;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    enum Script {
        Events(Vec<A2aResult<SessionEvent>>),
        Refuse(A2aError),
    }

    struct ScriptedRunner {
        script: Mutex<Option<Script>>,
        requests: Mutex<Vec<RunRequest>>,
    }

    impl ScriptedRunner {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(Some(script)),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn run(&self, request: RunRequest) -> A2aResult<SessionEventStream> {
            self.requests.lock().push(request);
            match self.script.lock().take() {
                Some(Script::Events(events)) => Ok(Box::pin(stream::iter(events))),
                Some(Script::Refuse(error)) => Err(error),
                None => Ok(Box::pin(stream::empty())),
            }
        }
    }

    struct BrokenSessions;

    #[async_trait]
    impl SessionService for BrokenSessions {
        async fn get(&self, _key: &SessionKey) -> A2aResult<Option<Session>> {
            Err(A2aError::Session("store offline".into()))
        }
        async fn create(&self, _key: SessionKey, _state: Metadata) -> A2aResult<Session> {
            Err(A2aError::Session("store offline".into()))
        }
        async fn append(&self, _key: &SessionKey, _event: SessionEvent) -> A2aResult<()> {
            Err(A2aError::Session("store offline".into()))
        }
        async fn list(&self, _app: &str, _user: &str) -> A2aResult<Vec<SessionKey>> {
            Ok(Vec::new())
        }
    }

    /// Accepts a fixed number of writes, then fails like a closed connection.
    struct FlakyQueue {
        accepted: Mutex<Vec<WireEvent>>,
        capacity: usize,
    }

    #[async_trait]
    impl EventQueue for FlakyQueue {
        async fn write(&self, event: WireEvent) -> A2aResult<()> {
            let mut accepted = self.accepted.lock();
            if accepted.len() >= self.capacity {
                return Err(A2aError::Transport("connection closed".into()));
            }
            accepted.push(event);
            Ok(())
        }
    }

    fn request(text: &str) -> RequestContext {
        RequestContext::new(
            TaskId::from_string("task-1"),
            ContextId::from_string("ctx-1"),
            Some(Message::new(MessageRole::User, vec![WirePart::text(text)])),
        )
    }

    fn stored_task() -> Task {
        Task {
            id: TaskId::from_string("task-1"),
            context_id: ContextId::from_string("ctx-1"),
            status: TaskStatus::new(TaskState::InputRequired, None),
            artifacts: Vec::new(),
            history: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    fn agent_says(text: &str) -> A2aResult<SessionEvent> {
        Ok(SessionEvent::new(InvocationId::from_string("inv"), "agent")
            .with_content(Content::model(vec![Part::text(text)])))
    }

    fn executor(runner: Arc<ScriptedRunner>, sessions: Arc<dyn SessionService>) -> Executor {
        Executor::new(ExecutorConfig::new("app"), runner, sessions)
    }

    /// (kind, state, final, append, last_chunk) per event.
    fn shape(events: &[WireEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                WireEvent::StatusUpdate(u) => format!("{:?} final={}", u.status.state, u.is_final),
                WireEvent::ArtifactUpdate(u) => format!(
                    "artifact parts={} append={} last={}",
                    u.artifact.parts.len(),
                    u.append,
                    u.last_chunk
                ),
                other => other.kind().to_owned(),
            })
            .collect()
    }

    #[tokio::test]
    async fn full_lifecycle_for_new_task() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new(Script::Events(vec![agent_says("a"), agent_says("b")]));
        let sessions = Arc::new(InMemorySessionService::new());
        let queue = CollectingEventQueue::new();

        executor(runner.clone(), sessions.clone())
            .execute(&request("hello"), &queue)
            .await?;

        let events = queue.take();
        assert_eq!(
            shape(&events),
            vec![
                "Submitted final=false",
                "Working final=false",
                "artifact parts=1 append=false last=false",
                "artifact parts=1 append=true last=false",
                "artifact parts=0 append=true last=true",
                "Completed final=true",
            ]
        );
        let WireEvent::StatusUpdate(working) = &events[1] else {
            panic!("expected working");
        };
        assert_eq!(working.metadata[APP_NAME_KEY], "app");
        assert_eq!(working.metadata[USER_ID_KEY], "A2A_USER_ctx-1");

        let run = runner.requests.lock().remove(0);
        assert_eq!(run.user_id, "A2A_USER_ctx-1");
        assert_eq!(run.session_id.as_str(), "ctx-1");
        assert_eq!(run.content, Content::user(vec![Part::text("hello")]));

        let key = SessionKey::new("app", "A2A_USER_ctx-1", "ctx-1");
        assert!(sessions.get(&key).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn existing_task_and_session_are_reused() -> anyhow::Result<()> {
        let sessions = Arc::new(InMemorySessionService::new());
        let key = SessionKey::new("app", "A2A_USER_ctx-1", "ctx-1");
        sessions.create(key, Metadata::new()).await?;
        let queue = CollectingEventQueue::new();

        let runner = ScriptedRunner::new(Script::Events(Vec::new()));
        executor(runner, sessions.clone())
            .execute(&request("again").with_stored_task(stored_task()), &queue)
            .await?;

        assert_eq!(
            shape(&queue.take()),
            vec!["Working final=false", "Completed final=true"]
        );
        assert_eq!(sessions.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn error_event_fails_task_despite_later_input_request() -> anyhow::Result<()> {
        let mut failing = SessionEvent::new(InvocationId::from_string("inv"), "agent");
        failing.error_code = Some("MAX_TOKENS".into());
        failing.error_message = Some("too long".into());
        let mut asking = SessionEvent::new(InvocationId::from_string("inv"), "agent").with_content(
            Content::model(vec![Part::FunctionCall(FunctionCall::new("c", "approve", json!({})))]),
        );
        asking.long_running_tool_ids = vec!["c".into()];

        let runner = ScriptedRunner::new(Script::Events(vec![Ok(failing), Ok(asking)]));
        let queue = CollectingEventQueue::new();
        executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&request("go"), &queue)
            .await?;

        let events = queue.take();
        assert_eq!(
            shape(&events).last().map(String::as_str),
            Some("Failed final=true")
        );
        assert_eq!(
            shape(&events).iter().filter(|s| s.ends_with("final=true")).count(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn run_refusal_emits_failed_without_closing_chunk() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new(Script::Refuse(A2aError::Run("model unavailable".into())));
        let queue = CollectingEventQueue::new();
        executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&request("go"), &queue)
            .await?;

        let events = queue.take();
        assert_eq!(
            shape(&events),
            vec!["Submitted final=false", "Working final=false", "Failed final=true"]
        );
        let WireEvent::StatusUpdate(failed) = &events[2] else {
            panic!("expected failed");
        };
        let text = failed
            .status
            .message
            .as_ref()
            .and_then(|m| m.parts.first())
            .cloned();
        assert_eq!(text, Some(WirePart::text("agent run failed: model unavailable")));
        Ok(())
    }

    #[tokio::test]
    async fn mid_run_error_stops_after_prior_artifacts() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new(Script::Events(vec![
            agent_says("partial"),
            Err(A2aError::Run("tool crashed".into())),
            agent_says("never"),
        ]));
        let queue = CollectingEventQueue::new();
        executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&request("go"), &queue)
            .await?;
        assert_eq!(
            shape(&queue.take()),
            vec![
                "Submitted final=false",
                "Working final=false",
                "artifact parts=1 append=false last=false",
                "Failed final=true",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn session_failure_is_reported_as_failed() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new(Script::Events(vec![agent_says("x")]));
        let queue = CollectingEventQueue::new();
        executor(runner.clone(), Arc::new(BrokenSessions))
            .execute(&request("go"), &queue)
            .await?;
        let events = queue.take();
        assert_eq!(shape(&events), vec!["Submitted final=false", "Failed final=true"]);
        let WireEvent::StatusUpdate(failed) = &events[1] else {
            panic!("expected failed");
        };
        assert_eq!(failed.metadata[APP_NAME_KEY], "app");
        assert!(runner.requests.lock().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_message_fails_the_task() -> anyhow::Result<()> {
        let mut bad = request("x");
        if let Some(message) = bad.message.as_mut() {
            message.parts = vec![WirePart::File(aios_protocol::FilePart {
                file: aios_protocol::FileContent::Bytes {
                    bytes: "%%%".into(),
                    mime_type: None,
                    name: None,
                },
                metadata: Metadata::new(),
            })];
        }
        let runner = ScriptedRunner::new(Script::Events(Vec::new()));
        let queue = CollectingEventQueue::new();
        executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&bad, &queue)
            .await?;
        assert_eq!(
            shape(&queue.take()),
            vec!["Submitted final=false", "Failed final=true"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_message_is_invalid_request() {
        let runner = ScriptedRunner::new(Script::Events(Vec::new()));
        let queue = CollectingEventQueue::new();
        let mut no_message = request("x");
        no_message.message = None;
        let err = executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&no_message, &queue)
            .await
            .unwrap_err();
        assert!(matches!(err, A2aError::InvalidRequest(_)));
        assert!(queue.take().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_aborts_with_sink_error() {
        let runner = ScriptedRunner::new(Script::Events(vec![agent_says("a"), agent_says("b")]));
        let queue = FlakyQueue {
            accepted: Mutex::new(Vec::new()),
            capacity: 3,
        };
        let err = executor(runner, Arc::new(InMemorySessionService::new()))
            .execute(&request("go"), &queue)
            .await
            .unwrap_err();
        assert!(err.is_sink());
        assert_eq!(queue.accepted.lock().len(), 3);
    }

    #[tokio::test]
    async fn cancel_requires_a_task() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new(Script::Events(Vec::new()));
        let executor = executor(runner, Arc::new(InMemorySessionService::new()));
        let queue = CollectingEventQueue::new();

        let err = executor.cancel(&request("x"), &queue).await.unwrap_err();
        assert!(matches!(err, A2aError::InvalidRequest(_)));

        executor
            .cancel(&request("x").with_stored_task(stored_task()), &queue)
            .await?;
        assert_eq!(shape(&queue.take()), vec!["Canceled final=true"]);
        Ok(())
    }
}
