//! Visualiser Configuration

use serde::Serialize;
use std::{path::PathBuf, time::Duration};
use tangle_core::FEED_TOPICS;
use tangle_pipeline::{FeedConfig, PipelineConfig};
use tangle_server::ServerConfig;
use tangle_viewer::ViewerConfig;

/// Server-mode settings, resolved from the command line and environment
#[derive(Debug, Clone, Serialize)]
pub struct ServeConfig {
    pub ws_addr: String,
    pub http_addr: String,
    pub feed_addr: String,
    pub feed_reconnect_ms: u64,
    pub stats_interval_ms: u64,
    pub batch_interval_ms: u64,
    pub legacy_tip_events: bool,
    /// Ledger node API for confirmation lookups; the store is used if unset
    pub node_api_url: Option<String>,
    pub lookup_timeout_ms: u64,
    /// Sled directory; nodes are kept in memory if unset
    pub data_dir: Option<PathBuf>,
}

impl ServeConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            stats_interval: Duration::from_millis(self.stats_interval_ms),
            batch_interval: Duration::from_millis(self.batch_interval_ms),
            legacy_tip_events: self.legacy_tip_events,
            node_api_url: self.node_api_url.clone(),
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
        }
    }

    pub fn feed(&self) -> FeedConfig {
        FeedConfig {
            addr: self.feed_addr.clone(),
            topics: FEED_TOPICS.iter().map(|t| t.to_string()).collect(),
            reconnect_delay: Duration::from_millis(self.feed_reconnect_ms),
        }
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            ws_addr: self.ws_addr.clone(),
            http_addr: self.http_addr.clone(),
        }
    }
}

/// Viewer-mode settings
#[derive(Debug, Clone, Serialize)]
pub struct WatchConfig {
    pub server_url: String,
    pub history_pages: usize,
    pub activity_log: bool,
    pub summary_interval_ms: u64,
}

impl WatchConfig {
    pub fn viewer(&self) -> ViewerConfig {
        ViewerConfig {
            server_url: self.server_url.clone(),
            history_pages: self.history_pages,
            activity_log: self.activity_log,
            summary_interval: Duration::from_millis(self.summary_interval_ms),
        }
    }
}
