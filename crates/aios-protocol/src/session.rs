//! Session identity and snapshot types.

use crate::event::{Metadata, SessionEvent};
use crate::ids::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A session is addressed by (app, user, session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: SessionId,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<SessionId>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// Snapshot of a session: identity, state bag and the ordered event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    #[serde(default)]
    pub state: Metadata,
    #[serde(default)]
    pub events: Vec<SessionEvent>,
    pub last_update: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, state: Metadata) -> Self {
        Self {
            key,
            state,
            events: Vec::new(),
            last_update: Utc::now(),
        }
    }
}
