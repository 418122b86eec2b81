use asis_core::clock::Clock;
use asis_core::error::{LifecycleError, Result};
use asis_core::policy::{ConsentInput, ConsentRecord, PolicyBinding, RetentionPolicy};
use asis_core::types::SessionId;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Session → retention policy + consent.
pub struct PolicyRegistry {
    clock: Arc<dyn Clock>,
    bindings: DashMap<SessionId, PolicyBinding>,
}

impl PolicyRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            bindings: DashMap::new(),
        }
    }

    /// Bind `mode_name` to the session, replacing any previous binding and its
    /// consent record. An unknown mode leaves the previous binding in place.
    pub fn set_choice(&self, session: &SessionId, mode_name: &str, consent: &ConsentInput) -> Result<PolicyBinding> {
        let policy: RetentionPolicy = mode_name.parse()?;
        Ok(self.bind(session, policy, consent))
    }

    pub fn bind(&self, session: &SessionId, policy: RetentionPolicy, consent: &ConsentInput) -> PolicyBinding {
        let binding = PolicyBinding {
            policy,
            consent: ConsentRecord::from_input(consent, self.clock.now()),
        };
        let previous = self.bindings.insert(session.clone(), binding.clone());
        info!(
            session = %session.short(),
            policy = %policy,
            previous = ?previous.map(|b| b.policy),
            explicit = consent.explicit,
            "retention policy chosen"
        );
        binding
    }

    pub fn get_policy(&self, session: &SessionId) -> Option<RetentionPolicy> {
        self.bindings.get(session).map(|b| b.policy)
    }

    pub fn binding(&self, session: &SessionId) -> Option<PolicyBinding> {
        self.bindings.get(session).map(|b| b.clone())
    }

    /// Like [`binding`](Self::binding) for callers that cannot proceed without one.
    pub fn require(&self, session: &SessionId) -> Result<PolicyBinding> {
        self.binding(session)
            .ok_or_else(|| LifecycleError::NoSession(session.clone()))
    }

    /// Drop the binding and its consent record. Returns whether one existed.
    pub fn clear(&self, session: &SessionId) -> bool {
        self.bindings.remove(session).is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
