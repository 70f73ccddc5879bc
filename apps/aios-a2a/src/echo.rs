//! Demo agent served by `aios-a2a serve`: records the user turn, then
//! replies with the same parts.

use std::sync::Arc;

use aios_protocol::{
    A2aResult, AgentRunner, Content, InvocationId, Part, RunRequest, SessionEvent,
    SessionEventStream, SessionService, USER_AUTHOR,
};
use async_trait::async_trait;
use futures_util::stream;
use tracing::{debug, instrument};

pub struct EchoAgent {
    name: String,
    sessions: Arc<dyn SessionService>,
}

impl EchoAgent {
    pub fn new(name: impl Into<String>, sessions: Arc<dyn SessionService>) -> Self {
        Self {
            name: name.into(),
            sessions,
        }
    }
}

#[async_trait]
impl AgentRunner for EchoAgent {
    #[instrument(skip(self, request), fields(agent = %self.name, session = %request.session_id))]
    async fn run(&self, request: RunRequest) -> A2aResult<SessionEventStream> {
        let key = request.session_key();
        let invocation_id = InvocationId::new_uuid();

        let user_turn =
            SessionEvent::new(invocation_id.clone(), USER_AUTHOR).with_content(request.content.clone());
        self.sessions.append(&key, user_turn).await?;

        let parts: Vec<Part> = request
            .content
            .parts
            .into_iter()
            .map(|part| match part {
                Part::Text { text, .. } => Part::text(format!("echo: {text}")),
                other => other,
            })
            .collect();
        let mut reply = SessionEvent::new(invocation_id, self.name.clone())
            .with_content(Content::model(parts));
        reply.turn_complete = true;
        self.sessions.append(&key, reply.clone()).await?;

        debug!("echo reply recorded");
        Ok(Box::pin(stream::iter([Ok(reply)])))
    }
}
