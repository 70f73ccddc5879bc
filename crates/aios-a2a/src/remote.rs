//! Client role: drive a remote A2A peer as if it were a local agent.

use std::sync::Arc;

use aios_protocol::{
    A2aClientFactory, A2aError, A2aResult, AgentCard, AgentCardResolver, MessageSendConfiguration,
    MessageSendParams, Metadata, SessionEvent, WireEvent,
};
use async_stream::stream;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::InvocationContext;
use crate::history::diff_history;
use crate::inbound::to_session_event;
use crate::metadata::{ERROR_KEY, REQUEST_KEY, RESPONSE_KEY, session_meta_key};

/// Events yielded by one remote invocation. Failures arrive as error-bearing
/// events, never as stream errors.
pub type RemoteEventStream = BoxStream<'static, SessionEvent>;

#[derive(Debug, Clone, Default)]
pub struct RemoteAgentConfig {
    pub name: String,
    pub description: String,
    /// Used as-is when present; otherwise resolved from `agent_card_source`
    /// on first use.
    pub agent_card: Option<AgentCard>,
    /// An `http(s)://` base URL or a local file path.
    pub agent_card_source: Option<String>,
    /// Attached to every `message/stream` request.
    pub send_configuration: Option<MessageSendConfiguration>,
}

impl RemoteAgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_agent_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    pub fn with_agent_card_source(mut self, source: impl Into<String>) -> Self {
        self.agent_card_source = Some(source.into());
        self
    }

    pub fn with_send_configuration(mut self, configuration: MessageSendConfiguration) -> Self {
        self.send_configuration = Some(configuration);
        self
    }
}

pub struct RemoteAgent {
    config: RemoteAgentConfig,
    resolver: Arc<dyn AgentCardResolver>,
    factory: Arc<dyn A2aClientFactory>,
    card: Mutex<Option<AgentCard>>,
}

impl RemoteAgent {
    pub fn new(
        config: RemoteAgentConfig,
        resolver: Arc<dyn AgentCardResolver>,
        factory: Arc<dyn A2aClientFactory>,
    ) -> A2aResult<Self> {
        let has_source = config
            .agent_card_source
            .as_deref()
            .is_some_and(|source| !source.is_empty());
        if config.agent_card.is_none() && !has_source {
            return Err(A2aError::InvalidRequest(
                "either an agent card or an agent card source must be provided".into(),
            ));
        }
        Ok(Self {
            card: Mutex::new(config.agent_card.clone()),
            config,
            resolver,
            factory,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    /// The card in use, once known.
    pub fn resolved_card(&self) -> Option<AgentCard> {
        self.card.lock().clone()
    }

    async fn resolve_card(&self) -> A2aResult<AgentCard> {
        let cached = self.card.lock().clone();
        if let Some(card) = cached {
            return Ok(card);
        }
        let source = self.config.agent_card_source.as_deref().unwrap_or_default();
        let card = self.resolver.resolve(source).await.map_err(|e| match e {
            A2aError::Resolution(_) => e,
            other => A2aError::Resolution(other.to_string()),
        })?;
        info!(agent = %self.config.name, card = %card.name, url = %card.url, "agent card resolved");
        *self.card.lock() = Some(card.clone());
        Ok(card)
    }

    /// Run one invocation against the peer.
    ///
    /// Lazily yields translated events in arrival order. Any resolution,
    /// transport or translation failure yields exactly one error event and
    /// ends the stream. Dropping the stream, or cancelling `ctx.cancel`,
    /// stops reading and releases the transport client. Yielded events are
    /// authored by the configured name, whatever `ctx.agent_name` says.
    pub fn run(self: Arc<Self>, mut ctx: InvocationContext) -> RemoteEventStream {
        if ctx.agent_name != self.config.name {
            debug!(context = %ctx.agent_name, agent = %self.config.name, "authoring events as the configured agent");
            ctx.agent_name = self.config.name.clone();
        }
        Box::pin(stream! {
            debug!(agent = %self.config.name, invocation_id = %ctx.invocation_id, "remote invocation started");
            let card = match self.resolve_card().await {
                Ok(card) => card,
                Err(error) => {
                    yield error_event(&ctx, &error, None);
                    return;
                }
            };

            let client = match self.factory.create(&card).await {
                Ok(client) => client,
                Err(error) => {
                    yield error_event(&ctx, &error, None);
                    return;
                }
            };

            let diff = match diff_history(&ctx.events, &self.config.name) {
                Ok(diff) => diff,
                Err(error) => {
                    yield error_event(&ctx, &error, None);
                    return;
                }
            };
            if diff.is_empty() {
                debug!("remote session is up to date, nothing to send");
                yield ctx.new_event();
                return;
            }

            let request = MessageSendParams {
                message: diff.into_message(),
                configuration: self.config.send_configuration.clone(),
                metadata: Metadata::new(),
            };

            let sent = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                sent = client.send_streaming_message(request.clone()) => Some(sent),
            };
            let mut inbound = match sent {
                None => {
                    debug!("invocation cancelled before the peer answered");
                    return;
                }
                Some(Ok(inbound)) => inbound,
                Some(Err(error)) => {
                    yield error_event(&ctx, &error, Some(&request));
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        debug!("invocation cancelled, closing remote stream");
                        break;
                    }
                    next = inbound.next() => next,
                };
                let Some(next) = next else {
                    break;
                };
                let wire = match next {
                    Ok(wire) => wire,
                    Err(error) => {
                        yield error_event(&ctx, &error, Some(&request));
                        break;
                    }
                };
                match to_session_event(&ctx, &wire) {
                    Ok(Some(mut event)) => {
                        attach_exchange(&mut event, &request, Some(&wire));
                        yield event;
                    }
                    Ok(None) => continue,
                    Err(error) => {
                        debug!(kind = wire.kind(), "inbound event could not be translated");
                        yield error_event(&ctx, &error, Some(&request));
                        break;
                    }
                }
            }
            drop(inbound);
            drop(client);
        })
    }
}

fn error_event(
    ctx: &InvocationContext,
    error: &A2aError,
    request: Option<&MessageSendParams>,
) -> SessionEvent {
    warn!(agent = %ctx.agent_name, %error, "remote invocation failed");
    let mut event = ctx.new_event();
    let message = error.to_string();
    event.error_message = Some(message.clone());
    event.metadata.insert(ERROR_KEY.into(), Value::String(message));
    if let Some(request) = request {
        attach_exchange(&mut event, request, None);
    }
    event
}

/// Record the outbound request and the raw inbound event on a yielded event.
fn attach_exchange(
    event: &mut SessionEvent,
    request: &MessageSendParams,
    response: Option<&WireEvent>,
) {
    attach_payload(event, REQUEST_KEY, "request", request);
    if let Some(response) = response {
        attach_payload(event, RESPONSE_KEY, "response", response);
    }
}

fn attach_payload<T: Serialize>(event: &mut SessionEvent, key: &str, name: &str, payload: &T) {
    match serde_json::to_value(payload) {
        Ok(value) => {
            event.metadata.insert(key.into(), value);
        }
        Err(error) => {
            event.metadata.insert(
                session_meta_key(&format!("{name}_codec_error")),
                Value::String(error.to_string()),
            );
        }
    }
}
