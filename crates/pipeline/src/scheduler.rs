//! Tick scheduling
//!
//! The stats tick and the node-batch tick are two named periodic tasks.
//! Both are delivered to the ingest loop through a [`Scheduler`], which is
//! injected at construction: [`IntervalScheduler`] in production,
//! [`ManualScheduler`] when a test wants to drive time by hand.

use async_trait::async_trait;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};

/// Which periodic task fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Stats,
    Batch,
}

/// Source of ticks for the ingest loop
#[async_trait]
pub trait Scheduler: Send {
    /// Wait for the next tick. `None` means no further ticks will come.
    async fn next_tick(&mut self) -> Option<Tick>;
}

/// Two independent tokio intervals
pub struct IntervalScheduler {
    stats: Interval,
    batch: Interval,
}

impl IntervalScheduler {
    /// First ticks fire one full period after construction
    pub fn new(stats_period: Duration, batch_period: Duration) -> Self {
        Self {
            stats: periodic(stats_period),
            batch: periodic(batch_period),
        }
    }
}

fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn next_tick(&mut self) -> Option<Tick> {
        // Batch wins when both are due
        tokio::select! {
            biased;
            _ = self.batch.tick() => Some(Tick::Batch),
            _ = self.stats.tick() => Some(Tick::Stats),
        }
    }
}

/// Ticks fired explicitly through a [`TickTrigger`]
pub struct ManualScheduler {
    rx: mpsc::UnboundedReceiver<Tick>,
}

/// Handle used to fire ticks on a [`ManualScheduler`]
#[derive(Clone)]
pub struct TickTrigger {
    tx: mpsc::UnboundedSender<Tick>,
}

impl ManualScheduler {
    pub fn new() -> (Self, TickTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, TickTrigger { tx })
    }
}

impl TickTrigger {
    /// Fire a tick. Returns false once the scheduler has been dropped.
    pub fn fire(&self, tick: Tick) -> bool {
        self.tx.send(tick).is_ok()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}
