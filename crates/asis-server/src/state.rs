//! Application state shared across all handlers.

use asis_classifier::{ClassifierConfig, ClassifierError, KeywordClassifier};
use asis_core::config::LifecycleConfig;
use asis_session::{LifecycleManager, MemoryDurableStore, MemoryEncryptedStore, MemoryKeyResolver};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
    /// Keys registered through the privacy endpoint for the encrypted tier.
    pub keys: Arc<MemoryKeyResolver>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<LifecycleManager>, keys: Arc<MemoryKeyResolver>) -> Self {
        Self { manager, keys, start_time: Instant::now() }
    }

    /// Manager wired to in-memory collaborators and the default classifier.
    pub fn in_memory(config: &LifecycleConfig) -> Result<Self, ClassifierError> {
        let keys = Arc::new(MemoryKeyResolver::new());
        let classifier = KeywordClassifier::new(&ClassifierConfig::default())?;
        let manager = LifecycleManager::builder()
            .config(config.clone())
            .durable(Arc::new(MemoryDurableStore::new()))
            .encrypted(Arc::new(MemoryEncryptedStore::new()), keys.clone())
            .classifier(Arc::new(classifier))
            .build();
        Ok(Self::new(Arc::new(manager), keys))
    }
}
