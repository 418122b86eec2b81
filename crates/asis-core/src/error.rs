use thiserror::Error;

use crate::report::DeletionReport;
use crate::types::SessionId;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid retention mode: {0:?}")]
    InvalidMode(String),
    #[error("No retention policy bound for session {0}")]
    NoSession(SessionId),
    #[error("Collaborator {collaborator} unavailable: {reason}")]
    CollaboratorUnavailable { collaborator: String, reason: String },
    #[error("Deletion incomplete, failed collaborators: {}", .failed.join(", "))]
    PartialDeletion {
        failed: Vec<String>,
        report: Box<DeletionReport>,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn unavailable(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }

    /// Names of collaborators that need a retry, if any.
    pub fn failed_collaborators(&self) -> &[String] {
        match self {
            Self::PartialDeletion { failed, .. } => failed,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
