//! Temporary tier: per-session messages that vanish a fixed time after the
//! first store.

use asis_core::clock::Clock;
use asis_core::error::{LifecycleError, Result};
use asis_core::types::{tail, Message, SessionId};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

struct TtlEntry {
    messages: Vec<Message>,
    expires_at: DateTime<Utc>,
}

impl TtlEntry {
    fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            expires_at,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Message lists with an absolute expiry set once, on the first append.
///
/// Later appends never extend the window. Expired entries are removed either
/// by [`TtlStore::sweep`] or lazily by the first [`TtlStore::fetch`] that sees them.
pub struct TtlStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: DashMap<SessionId, TtlEntry>,
}

impl TtlStore {
    /// Windows shorter than one second are raised to one second.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: ttl.max(Duration::seconds(1)),
            clock,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry's expiry. Fails without storing anything when
    /// `now + ttl` is past the representable range.
    pub fn append(&self, session: &SessionId, message: Message) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        let window_end = now.checked_add_signed(self.ttl).ok_or_else(|| {
            LifecycleError::InvalidConfig(format!("ttl of {}s overflows the clock at {now}", self.ttl.num_seconds()))
        })?;
        let mut entry = self
            .entries
            .entry(session.clone())
            .or_insert_with(|| TtlEntry::new(window_end));
        // An expired entry the sweep has not reached yet starts a new window.
        if entry.is_expired(now) {
            *entry = TtlEntry::new(window_end);
        }
        entry.messages.push(message);
        Ok(entry.expires_at)
    }

    /// Last `limit` messages, or nothing once the window has passed.
    pub fn fetch(&self, session: &SessionId, limit: usize) -> Vec<Message> {
        let now = self.clock.now();
        match self.entries.entry(session.clone()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired(now) {
                    let dropped = occupied.remove();
                    debug!(session = %session.short(), messages = dropped.messages.len(), "lazy ttl eviction");
                    Vec::new()
                } else {
                    tail(occupied.get().messages.iter().cloned(), limit)
                }
            }
            Entry::Vacant(_) => Vec::new(),
        }
    }

    pub fn delete(&self, session: &SessionId) -> usize {
        self.entries
            .remove(session)
            .map(|(_, entry)| entry.messages.len())
            .unwrap_or(0)
    }

    /// Remove every entry with `expires_at <= now`. Returns the number evicted.
    ///
    /// Keys are snapshotted first and each one is decided under its own lock,
    /// so unrelated sessions keep working while the sweep runs. A key deleted
    /// by someone else in between is simply skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let keys: Vec<SessionId> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut evicted = 0;
        for key in keys {
            if self.entries.remove_if(&key, |_, entry| entry.is_expired(now)).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    pub fn expires_at(&self, session: &SessionId) -> Option<DateTime<Utc>> {
        self.entries.get(session).map(|e| e.expires_at)
    }

    /// Messages held for the session, expired or not.
    pub fn len_for(&self, session: &SessionId) -> usize {
        self.entries.get(session).map(|e| e.messages.len()).unwrap_or(0)
    }

    pub fn contains(&self, session: &SessionId) -> bool {
        self.entries.contains_key(session)
    }

    pub fn session_count(&self) -> usize {
        self.entries.len()
    }
}
