//! Retention tiers, the policy registry, and the lifecycle manager that routes
//! session data between them.

pub mod crisis;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod ring;
pub mod sweeper;
pub mod ttl;

pub use crisis::CrisisLog;
pub use manager::{LifecycleManager, LifecycleManagerBuilder, DEFAULT_HISTORY_LIMIT};
pub use memory::{MemoryDurableStore, MemoryEncryptedStore, MemoryKeyResolver, RecordingDeleter};
pub use registry::PolicyRegistry;
pub use ring::{RingStore, DEFAULT_RING_CAPACITY};
pub use sweeper::{manual_scheduler, IntervalScheduler, ManualScheduler, ManualTrigger, Scheduler, SweepStats, Sweeper};
pub use ttl::TtlStore;
