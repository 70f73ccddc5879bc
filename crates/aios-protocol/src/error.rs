//! Error types for the A2A bridge.

use thiserror::Error;

/// Errors raised while bridging local sessions and remote A2A peers.
///
/// Only [`A2aError::Sink`] is allowed to abort an invocation as a hard error;
/// every other class is surfaced to the consumer as a single observable event.
#[derive(Debug, Clone, Error)]
pub enum A2aError {
    #[error("agent card resolution failed: {0}")]
    Resolution(String),
    #[error("no compatible transport: peer offers [{offered}], client supports [{supported}]")]
    NoCompatibleTransport { offered: String, supported: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),
    #[error("part conversion failed: {0}")]
    Codec(String),
    #[error("event write failed: {0}")]
    Sink(String),
    #[error("agent run failed: {0}")]
    Run(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl A2aError {
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NoCompatibleTransport { .. })
    }
}

impl From<serde_json::Error> for A2aError {
    fn from(error: serde_json::Error) -> Self {
        Self::Codec(error.to_string())
    }
}

/// Convenience result type for bridge operations.
pub type A2aResult<T> = Result<T, A2aError>;
