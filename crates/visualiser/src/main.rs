//! Tangle Visualiser
//!
//! Main entry point. Supports both server mode (ingests the node feed and
//! serves viewers) and viewer mode (headless client that mirrors the graph).

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tangle_core::{MemoryNodeStore, NodeStore, SledNodeStore};
use tangle_pipeline::{NodeApiLookup, Pipeline, PipelineService, TcpFeedSource};
use tangle_server::{HttpApiServer, ViewerHub, WebSocketServer};
use tangle_viewer::{HeadlessRenderer, ViewerClient};
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{ServeConfig, WatchConfig};

/// Frames buffered between the feed connection and the ingest task
const FRAME_CHANNEL_CAPACITY: usize = 4096;

/// Run mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Ingest the feed and serve viewers
    Server,
    /// Connect to a server as a headless viewer
    Viewer,
}

/// Live tangle visualiser
#[derive(Parser, Debug)]
#[command(name = "tangle-visualiser")]
#[command(about = "Streams a live DAG ledger to connected viewers", long_about = None)]
struct Args {
    /// Run mode (server or viewer)
    #[arg(long, value_enum, default_value = "server", env = "VISUALISER_MODE")]
    mode: Mode,

    /// WebSocket bind address for viewers
    #[arg(long, default_value = "127.0.0.1:3000", env = "VISUALISER_WS_ADDR")]
    ws_addr: String,

    /// HTTP API bind address
    #[arg(long, default_value = "127.0.0.1:3001", env = "VISUALISER_HTTP_ADDR")]
    http_addr: String,

    /// Node feed address (host:port)
    #[arg(long, default_value = "127.0.0.1:5556", env = "VISUALISER_FEED_ADDR")]
    feed_addr: String,

    /// Delay before reconnecting to the feed, in milliseconds
    #[arg(long, default_value = "5000", env = "VISUALISER_FEED_RECONNECT_MS")]
    feed_reconnect_ms: u64,

    /// Ledger node HTTP API used to look up confirmed values
    #[arg(long, env = "VISUALISER_NODE_API_URL")]
    node_api_url: Option<String>,

    /// Timeout for each value lookup, in milliseconds
    #[arg(long, default_value = "10000", env = "VISUALISER_LOOKUP_TIMEOUT_MS")]
    lookup_timeout_ms: u64,

    /// Stats broadcast interval in milliseconds
    #[arg(long, default_value = "60000", env = "VISUALISER_STATS_INTERVAL_MS")]
    stats_interval_ms: u64,

    /// Node batch broadcast interval in milliseconds
    #[arg(long, default_value = "5000", env = "VISUALISER_BATCH_INTERVAL_MS")]
    batch_interval_ms: u64,

    /// Also broadcast each node as a single `tip` event
    #[arg(long, env = "VISUALISER_LEGACY_TIP_EVENTS")]
    legacy_tip_events: bool,

    /// Data directory for the persistent node store (in-memory if unset)
    #[arg(long, env = "VISUALISER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Server WebSocket URL (viewer mode)
    #[arg(long, default_value = "ws://127.0.0.1:3000", env = "VISUALISER_SERVER_URL")]
    server_url: String,

    /// History pages to load after the first one (viewer mode)
    #[arg(long, default_value = "0", env = "VISUALISER_HISTORY_PAGES")]
    history_pages: usize,

    /// Log the most recent tips (viewer mode)
    #[arg(long, env = "VISUALISER_ACTIVITY_LOG")]
    activity_log: bool,

    /// Summary log interval in milliseconds (viewer mode)
    #[arg(long, default_value = "10000")]
    summary_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn serve_config(&self) -> ServeConfig {
        ServeConfig {
            ws_addr: self.ws_addr.clone(),
            http_addr: self.http_addr.clone(),
            feed_addr: self.feed_addr.clone(),
            feed_reconnect_ms: self.feed_reconnect_ms,
            stats_interval_ms: self.stats_interval_ms,
            batch_interval_ms: self.batch_interval_ms,
            legacy_tip_events: self.legacy_tip_events,
            node_api_url: self.node_api_url.clone(),
            lookup_timeout_ms: self.lookup_timeout_ms,
            data_dir: self.data_dir.clone(),
        }
    }

    fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            server_url: self.server_url.clone(),
            history_pages: self.history_pages,
            activity_log: self.activity_log,
            summary_interval_ms: self.summary_interval_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.mode {
        Mode::Server => run_server(args.serve_config()).await,
        Mode::Viewer => run_viewer(args.watch_config()).await,
    }
}

/// Run in server mode - ingest the feed and serve viewers
async fn run_server(config: ServeConfig) -> Result<()> {
    tracing::info!("Starting tangle visualiser - SERVER MODE");
    tracing::info!("  WebSocket: {}", config.ws_addr);
    tracing::info!("  HTTP API: {}", config.http_addr);
    tracing::info!("  Feed: {}", config.feed_addr);
    tracing::info!(
        "  Stats every {}ms, batches every {}ms",
        config.stats_interval_ms,
        config.batch_interval_ms
    );
    tracing::debug!("Configuration: {}", serde_json::to_string(&config)?);

    // Listeners first: failing to bind is fatal
    let server_config = config.server();
    let ws_listener = TcpListener::bind(&server_config.ws_addr).await?;
    let http_listener = TcpListener::bind(&server_config.http_addr).await?;

    let store: Box<dyn NodeStore> = match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Box::new(SledNodeStore::open(dir)?)
        }
        None => {
            tracing::info!("No data directory, keeping nodes in memory");
            Box::new(MemoryNodeStore::new())
        }
    };

    let pipeline_config = config.pipeline();
    let hub = Arc::new(ViewerHub::new());
    let pipeline = Pipeline::new(store, hub.clone())
        .with_legacy_tip_events(pipeline_config.legacy_tip_events);

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (mut service, handle) = PipelineService::new(
        pipeline,
        Box::new(pipeline_config.scheduler()),
        frames_rx,
        shutdown_rx.clone(),
    );
    if let Some(url) = &pipeline_config.node_api_url {
        tracing::info!("Looking up confirmed values at {}", url);
        let lookup = NodeApiLookup::new(url.as_str(), pipeline_config.lookup_timeout)?;
        service = service.with_lookup(Arc::new(lookup));
    }

    let ingest = tokio::spawn(service.run());

    let feed = TcpFeedSource::new(config.feed());
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed.run(frames_tx, shutdown_rx).await {
            tracing::error!("Feed source error: {}", e);
        }
    });

    let ws_server = WebSocketServer::new(hub.clone(), handle.clone());
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server.serve(ws_listener).await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    let http_server = HttpApiServer::new(handle);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http_server.serve(http_listener).await {
            tracing::error!("HTTP API server error: {}", e);
        }
    });

    tracing::info!("Visualiser running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    // Ingest stops first so the store is flushed before the servers go
    match ingest.await? {
        Ok(pipeline) => tracing::info!("Ingest stopped at index {}", pipeline.stats().index),
        Err(e) => tracing::error!("Ingest pipeline error: {}", e),
    }

    let _ = feed_handle.await;
    ws_handle.abort();
    http_handle.abort();

    let hub_stats = hub.stats();
    tracing::info!(
        "Visualiser stopped: {} viewers served, {} broadcasts sent",
        hub_stats.total_connections,
        hub_stats.broadcasts_sent
    );

    Ok(())
}

/// Run in viewer mode - mirror the server's graph headlessly
async fn run_viewer(config: WatchConfig) -> Result<()> {
    tracing::info!("Starting tangle visualiser - VIEWER MODE");
    tracing::info!("  Server: {}", config.server_url);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let client = ViewerClient::new(config.viewer());
    let session = client.run(HeadlessRenderer::new(), shutdown_rx).await?;

    let graph = session.graph();
    tracing::info!(
        "Viewer stopped with {} nodes and {} edges ({} repaints)",
        graph.node_count(),
        graph.edge_count(),
        graph.renderer().repaints()
    );

    Ok(())
}
