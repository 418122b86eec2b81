//! Per-session log of crisis-flagged messages.

use asis_core::types::{CrisisEvent, SessionId};
use dashmap::DashMap;

/// Crisis events outlive the tier that held the message: a temporary
/// session's events survive expiry and go only when the session's data is
/// deleted.
#[derive(Default)]
pub struct CrisisLog {
    events: DashMap<SessionId, Vec<CrisisEvent>>,
}

impl CrisisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session: &SessionId, event: CrisisEvent) {
        self.events.entry(session.clone()).or_default().push(event);
    }

    /// Events in the order they were recorded.
    pub fn events(&self, session: &SessionId) -> Vec<CrisisEvent> {
        self.events.get(session).map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len_for(&self, session: &SessionId) -> usize {
        self.events.get(session).map(|e| e.len()).unwrap_or(0)
    }

    /// Returns how many events were dropped.
    pub fn delete(&self, session: &SessionId) -> usize {
        self.events.remove(session).map(|(_, e)| e.len()).unwrap_or(0)
    }
}
