//! Ephemeral tier: a capped ring of messages per session.

use asis_core::types::{tail, Message, SessionId};
use dashmap::DashMap;
use std::collections::VecDeque;

pub const DEFAULT_RING_CAPACITY: usize = 20;

/// Per-session bounded message buffer.
///
/// Retention contract: nothing here expires and nothing survives the process.
/// A restart is equivalent to deleting every ring buffer.
pub struct RingStore {
    capacity: usize,
    buffers: DashMap<SessionId, VecDeque<Message>>,
}

impl RingStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append at the tail, dropping from the head past capacity.
    /// Returns the number of messages evicted.
    pub fn append(&self, session: &SessionId, message: Message) -> usize {
        let mut buffer = self.buffers.entry(session.clone()).or_default();
        buffer.push_back(message);
        let mut evicted = 0;
        while buffer.len() > self.capacity {
            buffer.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Last `limit` messages in insertion order.
    pub fn fetch(&self, session: &SessionId, limit: usize) -> Vec<Message> {
        self.buffers
            .get(session)
            .map(|buffer| tail(buffer.iter().cloned(), limit))
            .unwrap_or_default()
    }

    /// Drop the session's buffer. Returns how many messages it held.
    pub fn delete(&self, session: &SessionId) -> usize {
        self.buffers
            .remove(session)
            .map(|(_, buffer)| buffer.len())
            .unwrap_or(0)
    }

    pub fn len_for(&self, session: &SessionId) -> usize {
        self.buffers.get(session).map(|b| b.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.buffers.len()
    }
}

impl Default for RingStore {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
