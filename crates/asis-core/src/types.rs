use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle naming one conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading eight characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A stored conversation message.
///
/// Messages are never mutated once built; tiers only append or evict them.
/// `crisis` is produced upstream by a [`ContentClassifier`](crate::collaborator::ContentClassifier)
/// and is only carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub crisis: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, crisis: bool, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at,
            crisis,
        }
    }

    /// Serialize to a JSONL line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserialize from a JSONL line.
    pub fn from_jsonl(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// One crisis-flagged message as recorded for later review. Lives until the
/// session's data is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisEvent {
    pub at: DateTime<Utc>,
    pub role: Role,
    /// Classifier signals; empty when the caller set the flag directly.
    pub signals: Vec<String>,
}

/// Last `limit` items of `items`, in iteration order.
pub fn tail<T>(items: impl DoubleEndedIterator<Item = T>, limit: usize) -> Vec<T> {
    let mut out: Vec<T> = items.rev().take(limit).collect();
    out.reverse();
    out
}
