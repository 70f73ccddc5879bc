//! Collaborator ports for the A2A bridge.
//!
//! These traits are the only boundary between the bridge and the things it
//! treats as black boxes: the local agent engine, the session store, agent
//! card resolution, remote transports, and the outbound event queue.
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.
//! - Streaming uses boxed trait objects (`SessionEventStream`, `WireEventStream`).

use crate::card::AgentCard;
use crate::content::Content;
use crate::error::A2aResult;
use crate::event::{Metadata, SessionEvent};
use crate::ids::SessionId;
use crate::session::{Session, SessionKey};
use crate::wire::{MessageSendParams, WireEvent};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Events produced by one local agent run, pulled one at a time.
pub type SessionEventStream = BoxStream<'static, A2aResult<SessionEvent>>;

/// Events streamed back by a remote peer.
pub type WireEventStream = BoxStream<'static, A2aResult<WireEvent>>;

/// Options forwarded untouched to the local agent engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_llm_calls: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub content: Content,
    pub config: RunConfig,
}

impl RunRequest {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(
            self.app_name.clone(),
            self.user_id.clone(),
            self.session_id.clone(),
        )
    }
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Start a run. An `Err` here is a structural failure of the run itself;
    /// errors inside the stream end the run at that point.
    async fn run(&self, request: RunRequest) -> A2aResult<SessionEventStream>;
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn get(&self, key: &SessionKey) -> A2aResult<Option<Session>>;
    async fn create(&self, key: SessionKey, state: Metadata) -> A2aResult<Session>;
    async fn append(&self, key: &SessionKey, event: SessionEvent) -> A2aResult<()>;
    /// Sessions owned by one user of one app, in no particular order.
    async fn list(&self, app_name: &str, user_id: &str) -> A2aResult<Vec<SessionKey>>;
}

#[async_trait]
pub trait AgentCardResolver: Send + Sync {
    /// Resolve a card from an `http(s)://` base URL or a local file path.
    async fn resolve(&self, source: &str) -> A2aResult<AgentCard>;
}

#[async_trait]
pub trait A2aClient: Send + Sync {
    async fn send_streaming_message(&self, params: MessageSendParams)
    -> A2aResult<WireEventStream>;
}

#[async_trait]
pub trait A2aClientFactory: Send + Sync {
    /// Build a client for the card, failing with `NoCompatibleTransport` when
    /// the card and this factory share no transport.
    async fn create(&self, card: &AgentCard) -> A2aResult<Box<dyn A2aClient>>;
}

/// Outbound sink for server-side wire events.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn write(&self, event: WireEvent) -> A2aResult<()>;
}
