use aios_protocol::{InvocationId, SessionEvent};
use tokio_util::sync::CancellationToken;

/// Everything one client-role invocation knows about its surroundings: who
/// the remote peer is locally, the session history so far, and the caller's
/// cancellation token.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub invocation_id: InvocationId,
    pub agent_name: String,
    pub branch: Option<String>,
    pub events: Vec<SessionEvent>,
    pub cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new(agent_name: impl Into<String>, events: Vec<SessionEvent>) -> Self {
        Self {
            invocation_id: InvocationId::new_uuid(),
            agent_name: agent_name.into(),
            branch: None,
            events,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_invocation_id(mut self, invocation_id: InvocationId) -> Self {
        self.invocation_id = invocation_id;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// An empty event authored by the remote agent in this invocation.
    pub fn new_event(&self) -> SessionEvent {
        let mut event = SessionEvent::new(self.invocation_id.clone(), self.agent_name.clone());
        event.branch = self.branch.clone();
        event
    }
}
