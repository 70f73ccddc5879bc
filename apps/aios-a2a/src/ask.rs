//! `aios-a2a ask`: send one user turn to a remote agent through the local
//! session log and print whatever the peer streams back.

use std::sync::Arc;

use aios_a2a::{InvocationContext, RemoteAgent, RemoteAgentConfig};
use aios_a2a_client::{HttpCardResolver, HttpClientFactory};
use aios_protocol::{
    Content, InvocationId, Metadata, Part, SessionEvent, SessionKey, SessionService, USER_AUTHOR,
};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const APP_NAME: &str = "aios-a2a";
pub const CLI_USER: &str = "cli";

pub struct AskRequest {
    pub session_key: SessionKey,
    pub text: String,
}

/// Returns the events the remote produced, already appended to the session.
pub async fn ask(
    sessions: Arc<dyn SessionService>,
    agent: Arc<RemoteAgent>,
    request: AskRequest,
) -> Result<Vec<SessionEvent>> {
    let key = request.session_key;
    let session = match sessions.get(&key).await? {
        Some(session) => session,
        None => sessions.create(key.clone(), Metadata::new()).await?,
    };

    let invocation_id = InvocationId::new_uuid();
    let user_turn = SessionEvent::new(invocation_id.clone(), USER_AUTHOR)
        .with_content(Content::user(vec![Part::text(request.text)]));
    sessions.append(&key, user_turn.clone()).await?;

    let mut history = session.events;
    history.push(user_turn);

    let cancel = CancellationToken::new();
    let ctx = InvocationContext::new(agent.name(), history)
        .with_invocation_id(invocation_id)
        .with_cancel(cancel.clone());
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling remote call");
                cancel.cancel();
            }
        })
    };

    let mut produced = Vec::new();
    let mut events = agent.run(ctx);
    while let Some(event) = events.next().await {
        sessions
            .append(&key, event.clone())
            .await
            .with_context(|| format!("failed to append event to {key}"))?;
        produced.push(event);
    }
    ctrl_c.abort();
    info!(session = %key, events = produced.len(), "remote call finished");
    Ok(produced)
}

pub fn build_agent(agent_source: &str, agent_name: &str) -> Result<Arc<RemoteAgent>> {
    let config = RemoteAgentConfig::new(agent_name).with_agent_card_source(agent_source);
    let agent = RemoteAgent::new(
        config,
        Arc::new(HttpCardResolver::new()),
        Arc::new(HttpClientFactory::new()),
    )?;
    Ok(Arc::new(agent))
}

/// One line per event: the author, then text parts or the error.
pub fn render(event: &SessionEvent) -> String {
    if let Some(message) = &event.error_message {
        let code = event.error_code.as_deref().unwrap_or("error");
        return format!("[{}] {code}: {message}", event.author);
    }
    let text: Vec<&str> = event
        .parts()
        .iter()
        .filter(|part| !part.is_thought())
        .filter_map(Part::as_text)
        .collect();
    if text.is_empty() {
        let payload = serde_json::to_string(&event.content).unwrap_or_default();
        format!("[{}] {payload}", event.author)
    } else {
        format!("[{}] {}", event.author, text.join(""))
    }
}

pub fn session_key(session_id: Option<String>) -> SessionKey {
    let session_id = session_id.unwrap_or_else(|| aios_protocol::SessionId::new_uuid().to_string());
    SessionKey::new(APP_NAME, CLI_USER, session_id)
}
