//! The lifecycle manager: resolves each session's policy and routes stores,
//! reads, deletions and exports to the matching tier.

use asis_core::clock::{Clock, SystemClock};
use asis_core::collaborator::{AuxiliaryDeleter, ContentClassifier, DurableStore, EncryptedStore, KeyResolver, SessionKey};
use asis_core::config::LifecycleConfig;
use asis_core::error::{LifecycleError, Result};
use asis_core::policy::{ConsentInput, PolicyBinding, RetentionPolicy, Tier};
use asis_core::report::{DeletionReport, DeletionScope, ExportSnapshot, SessionStatus};
use asis_core::types::{tail, CrisisEvent, Message, Role, SessionId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::crisis::CrisisLog;
use crate::registry::PolicyRegistry;
use crate::ring::RingStore;
use crate::ttl::TtlStore;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

const DURABLE: &str = "durable";
const ENCRYPTED: &str = "encrypted";

struct EncryptedTier {
    store: Arc<dyn EncryptedStore>,
    keys: Arc<dyn KeyResolver>,
}

pub struct LifecycleManager {
    clock: Arc<dyn Clock>,
    registry: PolicyRegistry,
    ring: RingStore,
    ttl: TtlStore,
    crisis_log: CrisisLog,
    durable: Option<Arc<dyn DurableStore>>,
    encrypted: Option<EncryptedTier>,
    auxiliary: Vec<Arc<dyn AuxiliaryDeleter>>,
    classifier: Option<Arc<dyn ContentClassifier>>,
    timeout: Option<Duration>,
    history_limit: usize,
}

/// Assembles a [`LifecycleManager`]. Tiers that are not injected are built
/// from the config and the clock.
pub struct LifecycleManagerBuilder {
    config: LifecycleConfig,
    clock: Arc<dyn Clock>,
    registry: Option<PolicyRegistry>,
    ring: Option<RingStore>,
    ttl: Option<TtlStore>,
    durable: Option<Arc<dyn DurableStore>>,
    encrypted: Option<EncryptedTier>,
    auxiliary: Vec<Arc<dyn AuxiliaryDeleter>>,
    classifier: Option<Arc<dyn ContentClassifier>>,
}

impl LifecycleManagerBuilder {
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(mut self, registry: PolicyRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn ring(mut self, ring: RingStore) -> Self {
        self.ring = Some(ring);
        self
    }

    pub fn ttl(mut self, ttl: TtlStore) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn durable(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable = Some(store);
        self
    }

    pub fn encrypted(mut self, store: Arc<dyn EncryptedStore>, keys: Arc<dyn KeyResolver>) -> Self {
        self.encrypted = Some(EncryptedTier { store, keys });
        self
    }

    pub fn auxiliary(mut self, deleter: Arc<dyn AuxiliaryDeleter>) -> Self {
        self.auxiliary.push(deleter);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> LifecycleManager {
        let clock = self.clock;
        let retention = &self.config.retention;
        LifecycleManager {
            registry: self.registry.unwrap_or_else(|| PolicyRegistry::new(clock.clone())),
            ring: self.ring.unwrap_or_else(|| RingStore::new(retention.ring_capacity)),
            ttl: self.ttl.unwrap_or_else(|| TtlStore::new(retention.ttl(), clock.clone())),
            crisis_log: CrisisLog::new(),
            durable: self.durable,
            encrypted: self.encrypted,
            auxiliary: self.auxiliary,
            classifier: self.classifier,
            timeout: self.config.collaborators.timeout(),
            history_limit: retention.default_history_limit,
            clock,
        }
    }
}

impl LifecycleManager {
    pub fn builder() -> LifecycleManagerBuilder {
        LifecycleManagerBuilder {
            config: LifecycleConfig::default(),
            clock: Arc::new(SystemClock),
            registry: None,
            ring: None,
            ttl: None,
            durable: None,
            encrypted: None,
            auxiliary: Vec::new(),
            classifier: None,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn ring(&self) -> &RingStore {
        &self.ring
    }

    pub fn ttl(&self) -> &TtlStore {
        &self.ttl
    }

    pub fn crisis_log(&self) -> &CrisisLog {
        &self.crisis_log
    }

    pub fn default_history_limit(&self) -> usize {
        self.history_limit
    }

    // ---- policy ----

    pub fn set_choice(&self, session: &SessionId, mode_name: &str, consent: &ConsentInput) -> Result<PolicyBinding> {
        self.registry.set_choice(session, mode_name, consent)
    }

    pub fn policy(&self, session: &SessionId) -> Option<RetentionPolicy> {
        self.registry.get_policy(session)
    }

    pub fn clear_policy(&self, session: &SessionId) -> bool {
        self.registry.clear(session)
    }

    fn effective_policy(&self, session: &SessionId) -> RetentionPolicy {
        RetentionPolicy::resolve(self.registry.get_policy(session))
    }

    // ---- store / history ----

    /// Store one message in the tier implied by the session's policy
    /// (`ephemeral` when unbound). Returns the tier written.
    ///
    /// A `crisis` message is also recorded in the crisis log, without signals.
    pub async fn store(&self, session: &SessionId, role: Role, content: impl Into<String>, crisis: bool) -> Result<Tier> {
        let signals = crisis.then(Vec::new);
        self.store_with_signals(session, role, content.into(), signals).await
    }

    /// Run the configured classifier on user messages, then store.
    /// Returns the tier and the crisis flag that was recorded.
    pub async fn store_classified(&self, session: &SessionId, role: Role, content: impl Into<String>) -> Result<(Tier, bool)> {
        let content = content.into();
        let signals = match (&self.classifier, role) {
            (Some(classifier), Role::User) => Some(classifier.assess(&content)).filter(|s| !s.is_empty()),
            _ => None,
        };
        let crisis = signals.is_some();
        let tier = self.store_with_signals(session, role, content, signals).await?;
        Ok((tier, crisis))
    }

    async fn store_with_signals(&self, session: &SessionId, role: Role, content: String, signals: Option<Vec<String>>) -> Result<Tier> {
        let now = self.clock.now();
        let message = Message::new(role, content, signals.is_some(), now);
        let tier = self.effective_policy(session).tier();
        match tier {
            Tier::Ring => {
                let evicted = self.ring.append(session, message);
                if evicted > 0 {
                    debug!(session = %session.short(), evicted, "ring buffer full, oldest dropped");
                }
            }
            Tier::Ttl => {
                self.ttl.append(session, message)?;
            }
            Tier::Durable => {
                let store = self.durable_store()?;
                self.call(DURABLE, store.append(session, &message)).await?;
            }
            Tier::Encrypted => {
                let (store, key) = self.encrypted_for(session)?;
                self.call(ENCRYPTED, store.append(session, &key, &message)).await?;
            }
        }
        match signals {
            Some(signals) => {
                warn!(session = %session.short(), %tier, %role, signals = ?signals, "crisis-flagged message stored");
                self.crisis_log.record(session, CrisisEvent { at: now, role, signals });
            }
            None => debug!(session = %session.short(), %tier, %role, "message stored"),
        }
        Ok(tier)
    }

    /// Last `limit` messages from the session's current tier.
    ///
    /// An unreachable collaborator is an error, never an empty history.
    pub async fn history(&self, session: &SessionId, limit: usize) -> Result<Vec<Message>> {
        self.fetch_tier(session, self.effective_policy(session).tier(), limit).await
    }

    async fn fetch_tier(&self, session: &SessionId, tier: Tier, limit: usize) -> Result<Vec<Message>> {
        match tier {
            Tier::Ring => Ok(self.ring.fetch(session, limit)),
            Tier::Ttl => Ok(self.ttl.fetch(session, limit)),
            Tier::Durable => {
                let store = self.durable_store()?;
                let all = self.call(DURABLE, store.query(session)).await?;
                Ok(tail(all.into_iter(), limit))
            }
            Tier::Encrypted => {
                let (store, key) = self.encrypted_for(session)?;
                let all = self.call(ENCRYPTED, store.query(session, &key)).await?;
                Ok(tail(all.into_iter(), limit))
            }
        }
    }

    // ---- deletion ----

    /// Irreversibly delete the session's data and clear its policy binding.
    ///
    /// The binding is cleared even when a collaborator fails; failures come
    /// back as [`LifecycleError::PartialDeletion`] naming each collaborator.
    pub async fn delete_data(&self, session: &SessionId, scope: DeletionScope) -> Result<DeletionReport> {
        let mut report = DeletionReport::new(session.clone(), scope, self.clock.now());
        match scope {
            DeletionScope::Session => {
                let tier = self.effective_policy(session).tier();
                self.delete_from(session, tier, &mut report).await;
            }
            DeletionScope::Everything => {
                self.delete_from(session, Tier::Ring, &mut report).await;
                self.delete_from(session, Tier::Ttl, &mut report).await;
                if self.durable.is_some() {
                    self.delete_from(session, Tier::Durable, &mut report).await;
                }
                if self.encrypted.is_some() {
                    self.delete_from(session, Tier::Encrypted, &mut report).await;
                }
                for deleter in &self.auxiliary {
                    let name = deleter.name().to_string();
                    match self.call(&name, deleter.delete_everything(session)).await {
                        Ok(()) => report.auxiliary.push(name),
                        Err(_) => report.failed.push(name),
                    }
                }
            }
        }
        report.crisis_events_removed = self.crisis_log.delete(session);
        report.policy_cleared = self.registry.clear(session);

        if report.is_complete() {
            info!(
                session = %session.short(),
                scope = ?scope,
                tiers = ?report.tiers,
                removed = report.messages_removed,
                "session data deleted"
            );
            Ok(report)
        } else {
            warn!(
                session = %session.short(),
                scope = ?scope,
                failed = ?report.failed,
                removed = report.messages_removed,
                "session data deletion incomplete"
            );
            Err(LifecycleError::PartialDeletion {
                failed: report.failed.clone(),
                report: Box::new(report),
            })
        }
    }

    async fn delete_from(&self, session: &SessionId, tier: Tier, report: &mut DeletionReport) {
        let removed = match tier {
            Tier::Ring => Ok(self.ring.delete(session)),
            Tier::Ttl => Ok(self.ttl.delete(session)),
            Tier::Durable => match self.durable_store() {
                Ok(store) => self.call(DURABLE, store.delete_all(session)).await,
                Err(e) => Err(e),
            },
            Tier::Encrypted => match &self.encrypted {
                Some(encrypted) => self.call(ENCRYPTED, encrypted.store.delete_all(session)).await,
                None => Err(LifecycleError::unavailable(ENCRYPTED, "no encrypted store configured")),
            },
        };
        match removed {
            Ok(count) => report.record_tier(tier, count),
            Err(_) => report.failed.push(tier.to_string()),
        }
    }

    // ---- export / status ----

    /// Compliance snapshot: policy, consent and the full available history.
    /// Sessions that never chose a policy export as `ephemeral`.
    pub async fn export_data(&self, session: &SessionId) -> Result<ExportSnapshot> {
        let binding = self.registry.binding(session);
        let policy = RetentionPolicy::resolve(binding.as_ref().map(|b| b.policy));
        let history = self.fetch_tier(session, policy.tier(), usize::MAX).await?;
        debug!(session = %session.short(), %policy, messages = history.len(), "session exported");
        Ok(ExportSnapshot {
            session_id: session.clone(),
            exported_at: self.clock.now(),
            policy,
            policy_bound: binding.is_some(),
            history,
            consent: binding.map(|b| b.consent),
            crisis_events: self.crisis_log.events(session),
        })
    }

    pub fn status(&self, session: &SessionId) -> SessionStatus {
        let binding = self.registry.binding(session);
        let policy = binding.as_ref().map(|b| b.policy);
        let effective_policy = RetentionPolicy::resolve(policy);
        let tier = effective_policy.tier();
        let local = match tier {
            Tier::Ring => Some(self.ring.fetch(session, usize::MAX)),
            Tier::Ttl => Some(self.ttl.fetch(session, usize::MAX)),
            Tier::Durable | Tier::Encrypted => None,
        };
        SessionStatus {
            session_id: session.clone(),
            policy,
            effective_policy,
            tier,
            consent: binding.map(|b| b.consent),
            stored_messages: local.as_ref().map(|m| m.len()),
            crisis_messages: local.as_ref().map(|m| m.iter().filter(|m| m.crisis).count()),
            crisis_events: self.crisis_log.len_for(session),
        }
    }

    /// Retire `previous` (session-scope deletion) and hand out a fresh id.
    pub async fn start_new_session(&self, previous: Option<&SessionId>) -> Result<SessionId> {
        if let Some(previous) = previous {
            self.delete_data(previous, DeletionScope::Session).await?;
        }
        let session = SessionId::generate();
        info!(session = %session.short(), "new session started");
        Ok(session)
    }

    // ---- expiry ----

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let evicted = self.ttl.sweep(now);
        if evicted > 0 {
            info!(evicted, remaining = self.ttl.session_count(), "expired temporary sessions swept");
        } else {
            debug!(remaining = self.ttl.session_count(), "expiry sweep found nothing");
        }
        evicted
    }

    // ---- collaborators ----

    fn durable_store(&self) -> Result<&Arc<dyn DurableStore>> {
        self.durable
            .as_ref()
            .ok_or_else(|| LifecycleError::unavailable(DURABLE, "no durable store configured"))
    }

    fn encrypted_for(&self, session: &SessionId) -> Result<(&Arc<dyn EncryptedStore>, SessionKey)> {
        let tier = self
            .encrypted
            .as_ref()
            .ok_or_else(|| LifecycleError::unavailable(ENCRYPTED, "no encrypted store configured"))?;
        let key = tier
            .keys
            .resolve(session)
            .ok_or_else(|| LifecycleError::unavailable(ENCRYPTED, format!("no key for session {}", session.short())))?;
        Ok((&tier.store, key))
    }

    async fn call<T, F>(&self, collaborator: &str, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(collaborator, ?limit, "collaborator call timed out");
                    return Err(LifecycleError::unavailable(collaborator, format!("timed out after {limit:?}")));
                }
            },
            None => fut.await,
        };
        outcome.map_err(|e| {
            warn!(collaborator, error = %e, "collaborator call failed");
            LifecycleError::unavailable(collaborator, format!("{e:#}"))
        })
    }
}
