//! Session storage for the A2A bridge.
//!
//! Two [`SessionService`] backends share one contract: an in-memory map for
//! tests and short-lived servers, and an append-only JSONL file store.
//! [`SessionJournal`] pairs a store with an [`EventStreamHub`] so observers
//! can follow appended events live.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aios_protocol::{A2aError, A2aResult, Metadata, Session, SessionEvent, SessionKey, SessionService};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument};

fn session_error(context: impl std::fmt::Display, error: impl std::fmt::Display) -> A2aError {
    A2aError::Session(format!("{context}: {error}"))
}

#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get(&self, key: &SessionKey) -> A2aResult<Option<Session>> {
        Ok(self.sessions.lock().get(key).cloned())
    }

    #[instrument(skip(self, state), fields(session = %key))]
    async fn create(&self, key: SessionKey, state: Metadata) -> A2aResult<Session> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&key) {
            return Err(A2aError::Session(format!("session {key} already exists")));
        }
        let session = Session::new(key.clone(), state);
        sessions.insert(key, session.clone());
        debug!("session created");
        Ok(session)
    }

    #[instrument(skip(self, event), fields(session = %key, event_id = %event.id))]
    async fn append(&self, key: &SessionKey, event: SessionEvent) -> A2aResult<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| A2aError::Session(format!("session {key} not found")))?;
        session.last_update = event.timestamp;
        session.events.push(event);
        Ok(())
    }

    async fn list(&self, app_name: &str, user_id: &str) -> A2aResult<Vec<SessionKey>> {
        Ok(self
            .sessions
            .lock()
            .keys()
            .filter(|key| key.app_name == app_name && key.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// JSONL-backed store: one `<session>.jsonl` event log plus a
/// `<session>.state.json` snapshot per session, under `<root>/sessions/<app>/<user>/`.
#[derive(Debug)]
pub struct FileSessionService {
    root: PathBuf,
    write_locks: Mutex<HashMap<SessionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileSessionService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join("sessions")
            .join(path_segment(&key.app_name))
            .join(path_segment(&key.user_id))
    }

    fn events_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key)
            .join(format!("{}.jsonl", path_segment(key.session_id.as_str())))
    }

    fn state_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key)
            .join(format!("{}.state.json", path_segment(key.session_id.as_str())))
    }

    async fn ensure_parent(path: &Path) -> A2aResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| session_error(format!("failed to create session dir {parent:?}"), e))?;
        }
        Ok(())
    }

    fn lock_for(&self, key: &SessionKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.write_locks.lock();
        guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn read_events(path: &Path) -> A2aResult<Vec<SessionEvent>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .await
            .map_err(|e| session_error(format!("failed opening event log {path:?}"), e))?;
        let mut reader = BufReader::new(file).lines();
        let mut events = Vec::new();
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|e| session_error(format!("failed reading {path:?}"), e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let event: SessionEvent = serde_json::from_str(&line)
                .map_err(|e| session_error(format!("failed parsing event line in {path:?}"), e))?;
            events.push(event);
        }
        Ok(events)
    }
}

/// Keep IDs from escaping their directory. Every byte outside
/// `[A-Za-z0-9_-]` is written as `%XX`, so no segment is dot-only and
/// distinct IDs never share a file.
fn path_segment(raw: &str) -> String {
    let mut segment = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            segment.push(char::from(byte));
        } else {
            segment.push_str(&format!("%{byte:02X}"));
        }
    }
    segment
}

/// Inverse of [`path_segment`]; `None` for names it could not have produced.
fn decode_path_segment(segment: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(segment.len());
    let mut rest = segment.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl SessionService for FileSessionService {
    #[instrument(skip(self), fields(session = %key))]
    async fn get(&self, key: &SessionKey) -> A2aResult<Option<Session>> {
        let state_path = self.state_path(key);
        if !fs::try_exists(&state_path).await.unwrap_or(false) {
            return Ok(None);
        }
        let raw = fs::read(&state_path)
            .await
            .map_err(|e| session_error(format!("failed reading {state_path:?}"), e))?;
        let state: Metadata = serde_json::from_slice(&raw)
            .map_err(|e| session_error(format!("failed parsing {state_path:?}"), e))?;
        let events = Self::read_events(&self.events_path(key)).await?;
        let last_update = events
            .last()
            .map(|event| event.timestamp)
            .unwrap_or_else(Utc::now);
        debug!(count = events.len(), "session loaded from store");
        Ok(Some(Session {
            key: key.clone(),
            state,
            events,
            last_update,
        }))
    }

    #[instrument(skip(self, state), fields(session = %key))]
    async fn create(&self, key: SessionKey, state: Metadata) -> A2aResult<Session> {
        let state_path = self.state_path(&key);
        Self::ensure_parent(&state_path).await?;

        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        if fs::try_exists(&state_path).await.unwrap_or(false) {
            return Err(A2aError::Session(format!("session {key} already exists")));
        }
        let raw = serde_json::to_vec(&state)?;
        fs::write(&state_path, raw)
            .await
            .map_err(|e| session_error(format!("failed writing {state_path:?}"), e))?;
        debug!("session created in store");
        Ok(Session::new(key, state))
    }

    #[instrument(skip(self, event), fields(session = %key, event_id = %event.id))]
    async fn append(&self, key: &SessionKey, event: SessionEvent) -> A2aResult<()> {
        if !fs::try_exists(self.state_path(key)).await.unwrap_or(false) {
            return Err(A2aError::Session(format!("session {key} not found")));
        }
        let path = self.events_path(key);
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| session_error(format!("failed opening event log {path:?}"), e))?;

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| session_error(format!("failed writing {path:?}"), e))?;
        file.flush()
            .await
            .map_err(|e| session_error(format!("failed flushing {path:?}"), e))?;
        debug!("event appended to store");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, app_name: &str, user_id: &str) -> A2aResult<Vec<SessionKey>> {
        let dir = self
            .root
            .join("sessions")
            .join(path_segment(app_name))
            .join(path_segment(user_id));
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| session_error(format!("failed listing {dir:?}"), e))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| session_error(format!("failed listing {dir:?}"), e))?
        {
            let file_name = entry.file_name();
            if let Some(session_id) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".state.json"))
                .and_then(decode_path_segment)
            {
                keys.push(SessionKey::new(app_name, user_id, session_id));
            }
        }
        keys.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(keys)
    }
}

#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

/// A session store whose appends are also broadcast to live subscribers.
#[derive(Clone)]
pub struct SessionJournal {
    store: Arc<dyn SessionService>,
    stream: EventStreamHub,
}

impl SessionJournal {
    pub fn new(store: Arc<dyn SessionService>, stream: EventStreamHub) -> Self {
        Self { store, stream }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.stream.subscribe()
    }
}

#[async_trait]
impl SessionService for SessionJournal {
    async fn get(&self, key: &SessionKey) -> A2aResult<Option<Session>> {
        self.store.get(key).await
    }

    async fn create(&self, key: SessionKey, state: Metadata) -> A2aResult<Session> {
        self.store.create(key, state).await
    }

    #[instrument(skip(self, event), fields(session = %key, author = %event.author))]
    async fn append(&self, key: &SessionKey, event: SessionEvent) -> A2aResult<()> {
        self.store.append(key, event.clone()).await?;
        self.stream.publish(event);
        debug!("event published to stream");
        Ok(())
    }

    async fn list(&self, app_name: &str, user_id: &str) -> A2aResult<Vec<SessionKey>> {
        self.store.list(app_name, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use aios_protocol::{
        Content, InvocationId, Metadata, Part, SessionEvent, SessionKey, SessionService,
    };
    use anyhow::Result;
    use serde_json::json;
    use tokio::fs;

    use crate::{EventStreamHub, FileSessionService, InMemorySessionService, SessionJournal};

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    fn text_event(author: &str, text: &str) -> SessionEvent {
        SessionEvent::new(InvocationId::from_string("inv-1"), author)
            .with_content(Content::user(vec![Part::text(text)]))
    }

    #[tokio::test]
    async fn in_memory_store_appends_in_order() -> Result<()> {
        let store = InMemorySessionService::new();
        let key = SessionKey::new("app", "A2A_USER_ctx", "ctx");
        store.create(key.clone(), Metadata::new()).await?;
        store.append(&key, text_event("user", "one")).await?;
        store.append(&key, text_event("agent", "two")).await?;

        let session = store.get(&key).await?.expect("session exists");
        let texts: Vec<_> = session
            .events
            .iter()
            .filter_map(|e| e.parts().first().and_then(|p| p.as_text()))
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn in_memory_store_rejects_duplicate_create_and_missing_append() -> Result<()> {
        let store = InMemorySessionService::new();
        let key = SessionKey::new("app", "u", "s");
        store.create(key.clone(), Metadata::new()).await?;
        let err = store.create(key.clone(), Metadata::new()).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let missing = SessionKey::new("app", "u", "other");
        let err = store.append(&missing, text_event("user", "x")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(store.get(&missing).await?.is_none());
        assert_eq!(store.list("app", "u").await?, vec![key]);
        assert!(store.list("app", "nobody").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn file_store_persists_state_and_events() -> Result<()> {
        let root = unique_test_root("aios-sessions");
        let store = FileSessionService::new(&root);
        let key = SessionKey::new("app", "A2A_USER_ctx/1", "ctx/1");

        let mut state = Metadata::new();
        state.insert("tier".into(), json!("gold"));
        store.create(key.clone(), state).await?;
        store.append(&key, text_event("user", "hello")).await?;
        store.append(&key, text_event("agent", "hi")).await?;

        let reopened = FileSessionService::new(&root);
        let session = reopened.get(&key).await?.expect("session persisted");
        assert_eq!(session.state["tier"], "gold");
        assert_eq!(session.events.len(), 2);
        assert_eq!(session.events[1].author, "agent");

        let listed = reopened.list("app", "A2A_USER_ctx/1").await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id.as_str(), "ctx_1");

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_store_keeps_unusual_ids_apart_and_inside_root() -> Result<()> {
        let root = unique_test_root("aios-file-store-ids");
        let store = FileSessionService::new(&root);
        let ids = ["a/b", "a_b", "..", ".", "%2E"];
        for id in ids {
            let key = SessionKey::new("..", "A2A_USER_x", id);
            store.create(key.clone(), Metadata::new()).await?;
            store.append(&key, text_event("user", id)).await?;
        }

        for id in ids {
            let key = SessionKey::new("..", "A2A_USER_x", id);
            let session = store.get(&key).await?.expect("session exists");
            assert_eq!(session.events.len(), 1);
            assert_eq!(session.events[0].parts(), &[Part::text(id)]);
        }

        let mut listed: Vec<String> = store
            .list("..", "A2A_USER_x")
            .await?
            .into_iter()
            .map(|key| key.session_id.to_string())
            .collect();
        listed.sort();
        let mut expected: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        expected.sort();
        assert_eq!(listed, expected);

        let mut dirs = fs::read_dir(root.join("sessions")).await?;
        let mut app_dirs = Vec::new();
        while let Some(entry) = dirs.next_entry().await? {
            app_dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(app_dirs, vec!["%2E%2E".to_string()]);

        let _ = fs::remove_dir_all(&root).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_store_requires_created_session() -> Result<()> {
        let root = unique_test_root("aios-sessions-missing");
        let store = FileSessionService::new(&root);
        let key = SessionKey::new("app", "u", "s");
        assert!(store.get(&key).await?.is_none());
        let err = store.append(&key, text_event("user", "x")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn journal_publishes_appended_events() -> Result<()> {
        let store = Arc::new(InMemorySessionService::new());
        let journal = SessionJournal::new(store.clone(), EventStreamHub::new(16));
        let mut rx = journal.subscribe();
        let key = SessionKey::new("app", "u", "s");
        journal.create(key.clone(), Metadata::new()).await?;
        journal.append(&key, text_event("user", "ping")).await?;

        let published = rx.recv().await?;
        assert_eq!(published.parts()[0].as_text(), Some("ping"));
        assert_eq!(store.get(&key).await?.map(|s| s.events.len()), Some(1));
        Ok(())
    }
}
