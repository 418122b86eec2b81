//! External collaborator seams.
//!
//! The lifecycle manager calls into these but never owns their storage. Every
//! method may fail (network, timeouts); callers turn failures into
//! [`LifecycleError`](crate::LifecycleError)s instead of empty results.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::{Message, SessionId};

/// Persistent backend for the `persistent` policy.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn append(&self, session: &SessionId, message: &Message) -> anyhow::Result<()>;
    /// Full history in insertion order.
    async fn query(&self, session: &SessionId) -> anyhow::Result<Vec<Message>>;
    /// Returns the number of messages removed.
    async fn delete_all(&self, session: &SessionId) -> anyhow::Result<usize>;
}

/// Caller-held secret for the encrypted tier.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Short digest that identifies the key without revealing it.
    pub fn fingerprint(&self) -> String {
        let digest = hex::encode(Sha256::digest(self.0.as_bytes()));
        digest[..12].to_string()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

/// Encrypted backend for the `encrypted` policy.
#[async_trait]
pub trait EncryptedStore: Send + Sync {
    async fn append(&self, session: &SessionId, key: &SessionKey, message: &Message) -> anyhow::Result<()>;
    async fn query(&self, session: &SessionId, key: &SessionKey) -> anyhow::Result<Vec<Message>>;
    /// Deletion does not need the key.
    async fn delete_all(&self, session: &SessionId) -> anyhow::Result<usize>;
}

/// Looks up the secret for a session. Key management lives elsewhere.
pub trait KeyResolver: Send + Sync {
    fn resolve(&self, session: &SessionId) -> Option<SessionKey>;
}

/// Logs, backups, analytics: anything that may hold copies of session data.
#[async_trait]
pub trait AuxiliaryDeleter: Send + Sync {
    fn name(&self) -> &str;
    async fn delete_everything(&self, session: &SessionId) -> anyhow::Result<()>;
}

/// Upstream content check that sets a message's crisis flag.
pub trait ContentClassifier: Send + Sync {
    /// Signals found in `text`; empty when it is not a crisis.
    fn assess(&self, text: &str) -> Vec<String>;

    fn is_crisis(&self, text: &str) -> bool {
        !self.assess(text).is_empty()
    }
}
