//! Tangle Pipeline - ingest, aggregation and broadcast
//!
//! Architecture:
//! - One ingest task owns the node store, stats and pending batch
//! - Feed frames are applied in arrival order
//! - Two independent ticks flush stats and node batches to viewers
//! - Confirmation lookups may run remotely and report back asynchronously

pub mod batch;
pub mod feed_source;
pub mod lookup;
pub mod pipeline;
pub mod scheduler;
pub mod service;
pub mod transport;

pub use batch::{BatchBuffer, BroadcastStats};
pub use feed_source::{FeedConfig, FeedError, TcpFeedSource};
pub use lookup::{ConfirmationLookup, LookupError, NodeApiLookup};
pub use pipeline::{FrameOutcome, Pipeline};
pub use scheduler::{IntervalScheduler, ManualScheduler, Scheduler, Tick, TickTrigger};
pub use service::{PipelineHandle, PipelineRequest, PipelineService};
pub use transport::{Transport, ViewerId};

use std::time::Duration;
use tangle_core::{DEFAULT_BATCH_INTERVAL_MS, DEFAULT_STATS_INTERVAL_MS};

/// Default timeout for a confirmation lookup in milliseconds
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Stats broadcast interval
    pub stats_interval: Duration,
    /// Node-batch broadcast interval
    pub batch_interval: Duration,
    /// Broadcast every append as a single `tip` event as well
    pub legacy_tip_events: bool,
    /// Ledger node HTTP API used to look up confirmed values
    pub node_api_url: Option<String>,
    /// Per-request timeout for those lookups
    pub lookup_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_millis(DEFAULT_STATS_INTERVAL_MS),
            batch_interval: Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS),
            legacy_tip_events: false,
            node_api_url: None,
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }
}

impl PipelineConfig {
    /// Scheduler driven by the configured intervals
    pub fn scheduler(&self) -> IntervalScheduler {
        IntervalScheduler::new(self.stats_interval, self.batch_interval)
    }
}
