//! In-memory collaborators for tests and single-process runs.
//!
//! None of these persist anything; they satisfy the collaborator contracts
//! and can be switched offline to exercise failure paths.

use anyhow::bail;
use asis_core::collaborator::{AuxiliaryDeleter, DurableStore, EncryptedStore, KeyResolver, SessionKey};
use asis_core::types::{Message, SessionId};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

// ---------------------------------------------------------------------------
// MemoryDurableStore
// ---------------------------------------------------------------------------

/// Durable stand-in keeping each message as a JSONL row.
#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    rows: Mutex<HashMap<SessionId, Vec<String>>>,
    offline: AtomicBool,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len_for(&self, session: &SessionId) -> usize {
        self.rows.lock().get(session).map(Vec::len).unwrap_or(0)
    }

    fn ensure_online(&self) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("durable backend offline");
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn append(&self, session: &SessionId, message: &Message) -> anyhow::Result<()> {
        self.ensure_online()?;
        self.rows
            .lock()
            .entry(session.clone())
            .or_default()
            .push(message.to_jsonl());
        Ok(())
    }

    async fn query(&self, session: &SessionId) -> anyhow::Result<Vec<Message>> {
        self.ensure_online()?;
        let rows = self.rows.lock().get(session).cloned().unwrap_or_default();
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            messages.push(Message::from_jsonl(&row)?);
        }
        Ok(messages)
    }

    async fn delete_all(&self, session: &SessionId) -> anyhow::Result<usize> {
        self.ensure_online()?;
        Ok(self.rows.lock().remove(session).map(|r| r.len()).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// MemoryEncryptedStore
// ---------------------------------------------------------------------------

struct SealedSession {
    key_fingerprint: String,
    messages: Vec<Message>,
}

/// Encrypted stand-in: rows are bound to the fingerprint of the first key
/// used and refuse any other key. No actual encryption happens.
#[derive(Default)]
pub struct MemoryEncryptedStore {
    sessions: Mutex<HashMap<SessionId, SealedSession>>,
    offline: AtomicBool,
}

impl MemoryEncryptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len_for(&self, session: &SessionId) -> usize {
        self.sessions.lock().get(session).map(|s| s.messages.len()).unwrap_or(0)
    }

    fn ensure_online(&self) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("encrypted backend offline");
        }
        Ok(())
    }
}

#[async_trait]
impl EncryptedStore for MemoryEncryptedStore {
    async fn append(&self, session: &SessionId, key: &SessionKey, message: &Message) -> anyhow::Result<()> {
        self.ensure_online()?;
        let fingerprint = key.fingerprint();
        let mut sessions = self.sessions.lock();
        let sealed = sessions.entry(session.clone()).or_insert_with(|| SealedSession {
            key_fingerprint: fingerprint.clone(),
            messages: Vec::new(),
        });
        if sealed.key_fingerprint != fingerprint {
            bail!("key does not match session {}", session.short());
        }
        sealed.messages.push(message.clone());
        Ok(())
    }

    async fn query(&self, session: &SessionId, key: &SessionKey) -> anyhow::Result<Vec<Message>> {
        self.ensure_online()?;
        let sessions = self.sessions.lock();
        match sessions.get(session) {
            None => Ok(Vec::new()),
            Some(sealed) if sealed.key_fingerprint == key.fingerprint() => Ok(sealed.messages.clone()),
            Some(_) => bail!("key does not match session {}", session.short()),
        }
    }

    async fn delete_all(&self, session: &SessionId) -> anyhow::Result<usize> {
        self.ensure_online()?;
        Ok(self.sessions.lock().remove(session).map(|s| s.messages.len()).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// MemoryKeyResolver
// ---------------------------------------------------------------------------

/// Session keys registered by the caller.
#[derive(Debug, Default)]
pub struct MemoryKeyResolver {
    keys: RwLock<HashMap<SessionId, SessionKey>>,
}

impl MemoryKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: SessionId, key: SessionKey) {
        self.keys.write().insert(session, key);
    }

    pub fn remove(&self, session: &SessionId) -> Option<SessionKey> {
        self.keys.write().remove(session)
    }
}

impl KeyResolver for MemoryKeyResolver {
    fn resolve(&self, session: &SessionId) -> Option<SessionKey> {
        self.keys.read().get(session).cloned()
    }
}

// ---------------------------------------------------------------------------
// RecordingDeleter
// ---------------------------------------------------------------------------

/// Auxiliary system stand-in that records every deletion request.
#[derive(Debug)]
pub struct RecordingDeleter {
    name: String,
    requests: Mutex<Vec<SessionId>>,
    failing: AtomicBool,
}

impl RecordingDeleter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requests: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        let deleter = Self::new(name);
        deleter.set_failing(true);
        deleter
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SessionId> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AuxiliaryDeleter for RecordingDeleter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_everything(&self, session: &SessionId) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("{} rejected deletion request", self.name);
        }
        self.requests.lock().push(session.clone());
        Ok(())
    }
}
