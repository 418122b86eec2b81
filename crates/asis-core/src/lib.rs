//! Core data model for the session-data lifecycle manager: retention policies,
//! messages, consent metadata, errors, configuration and collaborator traits.

pub mod clock;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod policy;
pub mod report;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborator::{AuxiliaryDeleter, ContentClassifier, DurableStore, EncryptedStore, KeyResolver, SessionKey};
pub use config::LifecycleConfig;
pub use error::{LifecycleError, Result};
pub use policy::{ConsentInput, ConsentRecord, PolicyBinding, RetentionPolicy, Tier};
pub use report::{DeletionReport, DeletionScope, ExportSnapshot, SessionStatus};
pub use types::{CrisisEvent, Message, Role, SessionId};
