//! Tangle Viewer - client side of the visualiser
//!
//! - [`GraphReconciler`] mirrors the node stream into a [`Renderer`]
//! - [`ViewerSession`] handles welcome, paging and the activity log
//! - [`ViewerClient`] drives a session over a WebSocket connection

pub mod client;
pub mod format;
pub mod reconciler;
pub mod render;
pub mod session;

pub use client::{ViewerClient, ViewerStatus};
pub use format::format_magnitude;
pub use reconciler::{Category, GraphReconciler};
pub use render::{Color, HeadlessRenderer, Renderer};
pub use session::{ActivityEntry, ActivityLog, ViewerSession};

use std::time::Duration;

/// Viewer configuration
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    /// Server WebSocket URL
    pub server_url: String,
    /// History pages to load automatically after the first one
    pub history_pages: usize,
    /// Keep the recent-activity log
    pub activity_log: bool,
    /// How often to log a one-line summary
    pub summary_interval: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000".to_string(),
            history_pages: 0,
            activity_log: false,
            summary_interval: Duration::from_secs(10),
        }
    }
}
