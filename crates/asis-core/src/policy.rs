//! Retention policies, storage tiers and consent metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::LifecycleError;

/// How a session's messages are retained.
///
/// Sessions that never made a choice are treated as [`RetentionPolicy::Ephemeral`]
/// for storage, see [`RetentionPolicy::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Capped in-memory ring, gone on restart.
    #[default]
    Ephemeral,
    /// In-memory with a fixed window from first use.
    Temporary,
    /// Handed to the durable collaborator.
    Persistent,
    /// Handed to the encrypted collaborator with a per-session key.
    Encrypted,
}

impl RetentionPolicy {
    pub const ALL: [RetentionPolicy; 4] = [
        RetentionPolicy::Ephemeral,
        RetentionPolicy::Temporary,
        RetentionPolicy::Persistent,
        RetentionPolicy::Encrypted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::Ephemeral => "ephemeral",
            RetentionPolicy::Temporary => "temporary",
            RetentionPolicy::Persistent => "persistent",
            RetentionPolicy::Encrypted => "encrypted",
        }
    }

    /// The storage tier this policy writes to.
    pub fn tier(&self) -> Tier {
        match self {
            RetentionPolicy::Ephemeral => Tier::Ring,
            RetentionPolicy::Temporary => Tier::Ttl,
            RetentionPolicy::Persistent => Tier::Durable,
            RetentionPolicy::Encrypted => Tier::Encrypted,
        }
    }

    /// Effective policy for an optional binding.
    pub fn resolve(bound: Option<RetentionPolicy>) -> RetentionPolicy {
        bound.unwrap_or_default()
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionPolicy {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ephemeral" => Ok(RetentionPolicy::Ephemeral),
            "temporary" => Ok(RetentionPolicy::Temporary),
            "persistent" => Ok(RetentionPolicy::Persistent),
            "encrypted" => Ok(RetentionPolicy::Encrypted),
            _ => Err(LifecycleError::InvalidMode(s.to_string())),
        }
    }
}

/// Storage backend a message lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Ring,
    Ttl,
    Durable,
    Encrypted,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Ring => "ring",
            Tier::Ttl => "ttl",
            Tier::Durable => "durable",
            Tier::Encrypted => "encrypted",
        }
    }

    /// Whether the tier lives behind an external collaborator.
    pub fn is_external(&self) -> bool {
        matches!(self, Tier::Durable | Tier::Encrypted)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw origin facts supplied with a privacy choice.
///
/// Only the hashes of `caller_address` and `client_signature` are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentInput {
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub caller_address: Option<String>,
    #[serde(default)]
    pub client_signature: Option<String>,
}

impl ConsentInput {
    pub fn explicit() -> Self {
        Self {
            explicit: true,
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, caller_address: impl Into<String>, client_signature: impl Into<String>) -> Self {
        self.caller_address = Some(caller_address.into());
        self.client_signature = Some(client_signature.into());
        self
    }
}

/// Consent metadata recorded with a policy binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub explicit: bool,
    pub chosen_at: DateTime<Utc>,
    pub address_hash: Option<String>,
    pub client_signature_hash: Option<String>,
}

impl ConsentRecord {
    pub fn from_input(input: &ConsentInput, chosen_at: DateTime<Utc>) -> Self {
        Self {
            explicit: input.explicit,
            chosen_at,
            address_hash: input.caller_address.as_deref().and_then(hash_origin),
            client_signature_hash: input.client_signature.as_deref().and_then(hash_origin),
        }
    }
}

/// SHA-256 hex of an origin identifier; blank input yields `None`.
pub fn hash_origin(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(hex::encode(Sha256::digest(raw.as_bytes())))
}

/// A session's current policy together with its consent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBinding {
    pub policy: RetentionPolicy,
    pub consent: ConsentRecord,
}
