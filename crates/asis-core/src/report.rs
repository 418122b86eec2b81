//! Outcome records for deletion, export and status requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{ConsentRecord, RetentionPolicy, Tier};
use crate::types::{CrisisEvent, Message, SessionId};

/// How far a deletion request reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionScope {
    /// Only the tier implied by the session's policy.
    #[default]
    Session,
    /// Every tier, every collaborator store and every auxiliary system.
    Everything,
}

/// What a deletion request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub session_id: SessionId,
    pub scope: DeletionScope,
    /// Tiers that were asked to delete and answered.
    pub tiers: Vec<Tier>,
    pub messages_removed: usize,
    pub crisis_events_removed: usize,
    /// Auxiliary systems that confirmed deletion.
    pub auxiliary: Vec<String>,
    /// Collaborators that failed; empty on a complete deletion.
    pub failed: Vec<String>,
    pub policy_cleared: bool,
    pub deleted_at: DateTime<Utc>,
}

impl DeletionReport {
    pub fn new(session_id: SessionId, scope: DeletionScope, deleted_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            scope,
            tiers: Vec::new(),
            messages_removed: 0,
            crisis_events_removed: 0,
            auxiliary: Vec::new(),
            failed: Vec::new(),
            policy_cleared: false,
            deleted_at,
        }
    }

    pub fn record_tier(&mut self, tier: Tier, removed: usize) {
        if !self.tiers.contains(&tier) {
            self.tiers.push(tier);
        }
        self.messages_removed += removed;
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Data-export snapshot for a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub session_id: SessionId,
    pub exported_at: DateTime<Utc>,
    /// Resolved policy; `ephemeral` when none was ever chosen.
    pub policy: RetentionPolicy,
    pub policy_bound: bool,
    pub history: Vec<Message>,
    pub consent: Option<ConsentRecord>,
    pub crisis_events: Vec<CrisisEvent>,
}

impl ExportSnapshot {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-session status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    /// `None` when no choice was ever made.
    pub policy: Option<RetentionPolicy>,
    pub effective_policy: RetentionPolicy,
    pub tier: Tier,
    pub consent: Option<ConsentRecord>,
    /// Locally held messages; `None` for collaborator tiers.
    pub stored_messages: Option<usize>,
    pub crisis_messages: Option<usize>,
    /// Recorded crisis events, counted for every tier.
    pub crisis_events: usize,
}
