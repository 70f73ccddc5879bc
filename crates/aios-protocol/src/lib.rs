//! # aios-protocol — Agent-to-Agent bridge contract
//!
//! Shared types and trait interfaces for bridging aiOS sessions with remote
//! A2A peers, in both directions.
//!
//! It is intentionally dependency-light (no runtime deps like tokio, axum, or
//! reqwest) so it can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (EventId, InvocationId, TaskId, ContextId, etc.)
//! - [`content`] — Content + Part (text, file, function call/response, code)
//! - [`event`] — SessionEvent, the append-only session log record
//! - [`wire`] — WireEvent, WirePart, Task, Message (forward-compatible)
//! - [`card`] — AgentCard, transports, skills
//! - [`jsonrpc`] — JSON-RPC 2.0 envelopes for the HTTP binding
//! - [`session`] — SessionKey, Session snapshot
//! - [`ports`] — Collaborator ports (runner, sessions, resolver, transport, queue)
//! - [`error`] — A2aError, A2aResult

pub mod card;
pub mod content;
pub mod error;
pub mod event;
pub mod ids;
pub mod jsonrpc;
pub mod ports;
pub mod session;
pub mod wire;

// Re-export the most commonly used types at the crate root.
pub use card::{
    AGENT_CARD_PATH, AgentCapabilities, AgentCard, AgentInterface, AgentSkill, TRANSPORT_JSONRPC,
};
pub use content::{
    CodeExecutionResult, Content, ExecutableCode, FileData, FileSource, FunctionCall,
    FunctionResponse, Language, Outcome, Part, Role, Scheduling,
};
pub use error::{A2aError, A2aResult};
pub use event::{Metadata, SessionEvent, USER_AUTHOR};
pub use ids::{ArtifactId, ContextId, EventId, InvocationId, MessageId, SessionId, TaskId};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, TaskIdParams};
pub use ports::{
    A2aClient, A2aClientFactory, AgentCardResolver, AgentRunner, EventQueue, RunConfig,
    RunRequest, SessionEventStream, SessionService, WireEventStream,
};
pub use session::{Session, SessionKey};
pub use wire::{
    Artifact, DataPart, FileContent, FilePart, Message, MessageRole, MessageSendConfiguration,
    MessageSendParams, Task, TaskArtifactUpdateEvent, TaskRef, TaskState, TaskStatus,
    TaskStatusUpdateEvent, TextPart, WireEvent, WirePart,
};
