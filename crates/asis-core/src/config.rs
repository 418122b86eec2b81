use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{LifecycleError, Result};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "ASIS_CONFIG";

/// Longest accepted temporary-tier window: ten years.
pub const MAX_TTL_SECS: u64 = 10 * 366 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub retention: RetentionConfig,
    pub sweep: SweepConfig,
    pub collaborators: CollaboratorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Ring buffer cap for the ephemeral tier.
    pub ring_capacity: usize,
    /// Window of the temporary tier, counted from the first store.
    pub ttl_secs: u64,
    pub default_history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Per-call timeout for durable/encrypted/auxiliary hooks. Unbounded when unset.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 20,
            ttl_secs: 24 * 60 * 60,
            default_history_limit: 20,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 60 * 60 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl RetentionConfig {
    /// Clamped to [`MAX_TTL_SECS`]; `validate` rejects anything above it.
    pub fn ttl(&self) -> chrono::TimeDelta {
        let secs = self.ttl_secs.min(MAX_TTL_SECS) as i64;
        chrono::TimeDelta::try_seconds(secs).unwrap_or(chrono::TimeDelta::MAX)
    }
}

impl SweepConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_ms.map(std::time::Duration::from_millis)
    }
}

impl LifecycleConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading lifecycle config");
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        Ok(Self::from_json_str(&raw)?)
    }

    /// Config file from `ASIS_CONFIG` (defaults otherwise), then
    /// `ASIS_HOST` / `ASIS_PORT` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(host) = std::env::var("ASIS_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("ASIS_PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("ASIS_PORT={port:?}: {e}"))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention.ring_capacity == 0 {
            return Err(LifecycleError::InvalidConfig("retention.ring_capacity must be at least 1".into()));
        }
        if self.retention.ttl_secs == 0 {
            return Err(LifecycleError::InvalidConfig("retention.ttl_secs must be at least 1".into()));
        }
        if self.retention.ttl_secs > MAX_TTL_SECS {
            return Err(LifecycleError::InvalidConfig(format!(
                "retention.ttl_secs must be at most {MAX_TTL_SECS}, got {}",
                self.retention.ttl_secs
            )));
        }
        if self.sweep.interval_secs == 0 {
            return Err(LifecycleError::InvalidConfig("sweep.interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}
