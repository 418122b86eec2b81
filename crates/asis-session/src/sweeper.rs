//! Periodic expiry sweep over the temporary tier.
//!
//! The sweep loop is driven by a [`Scheduler`] so tests can tick it by hand
//! instead of waiting on real hours.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::info;

use crate::manager::LifecycleManager;

/// Source of sweep ticks.
#[async_trait]
pub trait Scheduler: Send {
    /// Wait for the next tick. `false` ends the sweep loop.
    async fn next_tick(&mut self) -> bool;
}

/// Ticks every `period`, the first one a full period after creation.
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn next_tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Scheduler that ticks only when its [`ManualTrigger`] says so.
pub struct ManualScheduler {
    ticks: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct ManualTrigger {
    ticks: mpsc::UnboundedSender<()>,
}

impl ManualTrigger {
    /// Queue one tick. Returns `false` once the scheduler is gone.
    pub fn tick(&self) -> bool {
        self.ticks.send(()).is_ok()
    }
}

/// A trigger/scheduler pair. Dropping every trigger stops the loop after the
/// queued ticks have run.
pub fn manual_scheduler() -> (ManualTrigger, ManualScheduler) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ManualTrigger { ticks: tx }, ManualScheduler { ticks: rx })
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn next_tick(&mut self) -> bool {
        self.ticks.recv().await.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub ticks: u64,
    pub evicted: usize,
}

pub struct Sweeper;

impl Sweeper {
    /// Sweep on every tick until the scheduler stops.
    pub async fn run<S: Scheduler>(manager: Arc<LifecycleManager>, mut scheduler: S) -> SweepStats {
        let mut stats = SweepStats::default();
        while scheduler.next_tick().await {
            let now = manager.clock().now();
            stats.evicted += manager.sweep_expired(now);
            stats.ticks += 1;
        }
        info!(ticks = stats.ticks, evicted = stats.evicted, "expiry sweeper stopped");
        stats
    }

    pub fn spawn<S: Scheduler + 'static>(manager: Arc<LifecycleManager>, scheduler: S) -> JoinHandle<SweepStats> {
        info!("expiry sweeper started");
        tokio::spawn(Self::run(manager, scheduler))
    }
}
