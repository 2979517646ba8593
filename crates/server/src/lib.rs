//! Tangle Server - viewer-facing endpoints
//!
//! Provides:
//! - WebSocket: welcome, live `stats`/`tips` broadcasts, private `history` replies
//! - HTTP: read-only stats and history JSON
//! - The viewer hub that implements the pipeline's transport

pub mod http_server;
pub mod hub;
pub mod ws_server;

pub use http_server::HttpApiServer;
pub use hub::{HubStats, ViewerHub};
pub use ws_server::WebSocketServer;

/// Server endpoint configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// WebSocket bind address
    pub ws_addr: String,
    /// HTTP API bind address
    pub http_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: "127.0.0.1:3000".to_string(),
            http_addr: "127.0.0.1:3001".to_string(),
        }
    }
}
