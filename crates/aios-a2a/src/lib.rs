//! # aios-a2a — bridge between aiOS sessions and A2A peers
//!
//! Client role: [`RemoteAgent`] works out what a remote peer has not seen
//! ([`history`]), sends it, and turns the peer's streamed replies back into
//! session events ([`inbound`]).
//!
//! Server role: [`Executor`] runs a local agent for an inbound request and
//! reports it as a task lifecycle through an [`EventQueue`], with
//! [`EventProcessor`] tracking artifact identity and the terminal status.
//!
//! Both sides share the [`codec`] for content parts and the [`metadata`]
//! keys used for correlation.
//!
//! [`EventQueue`]: aios_protocol::EventQueue

pub mod codec;
pub mod context;
pub mod executor;
pub mod history;
pub mod inbound;
pub mod metadata;
pub mod processor;
pub mod queue;
pub mod remote;
pub mod skills;

pub use codec::{DecodedParts, decode, encode};
pub use context::InvocationContext;
pub use executor::{Executor, ExecutorConfig, RequestContext};
pub use history::{HistoryDiff, diff_history};
pub use inbound::{event_to_message, to_session_event};
pub use metadata::{InvocationMeta, TaskInfo, correlation_metadata, task_info};
pub use processor::{EventProcessor, task_failed_event};
pub use queue::{ChannelEventQueue, CollectingEventQueue};
pub use remote::{RemoteAgent, RemoteAgentConfig, RemoteEventStream};
pub use skills::{AgentKind, AgentProfile, ToolProfile, build_agent_skills, replace_pronouns};
