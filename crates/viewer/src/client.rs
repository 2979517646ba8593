//! Viewer client - WebSocket connection to the visualiser server
//!
//! Feeds every server event through a [`ViewerSession`], answers the
//! welcome with a history request and optionally pages further back on its
//! own. A shared [`ViewerStatus`] is kept current for observers.

use crate::{render::Renderer, session::ViewerSession, ViewerConfig};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tangle_core::{ServerEvent, StatsWindow, ViewerRequest};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Snapshot of the viewer, readable while the client runs
#[derive(Debug, Clone, Default)]
pub struct ViewerStatus {
    pub connected: bool,
    pub stats: Option<StatsWindow>,
    pub node_count: usize,
    pub edge_count: usize,
    pub events_received: u64,
    pub history_requests: u64,
}

/// Headless viewer connected to one server
pub struct ViewerClient {
    config: ViewerConfig,
    status: Arc<RwLock<ViewerStatus>>,
}

impl ViewerClient {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            status: Arc::new(RwLock::new(ViewerStatus::default())),
        }
    }

    pub fn status(&self) -> Arc<RwLock<ViewerStatus>> {
        self.status.clone()
    }

    /// Run until the server goes away or shutdown is signalled.
    /// Returns the session so the final graph can be inspected.
    pub async fn run<R: Renderer>(
        self,
        renderer: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<ViewerSession<R>> {
        let (ws_stream, _) = connect_async(self.config.server_url.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        tracing::info!("Connected to {}", self.config.server_url);
        self.status.write().connected = true;

        let mut session = ViewerSession::new(renderer).with_activity_log(self.config.activity_log);
        let mut pages_left = self.config.history_pages;
        let mut summary = tokio::time::interval(self.config.summary_interval);

        'outer: loop {
            let mut requests: Vec<ViewerRequest> = Vec::new();

            tokio::select! {
                msg = ws_receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event = match ServerEvent::from_json(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::debug!("Ignoring server message: {}", e);
                                continue;
                            }
                        };
                        let is_tips = matches!(event, ServerEvent::Tips(_));

                        requests.extend(session.handle_event(event));
                        if is_tips && pages_left > 0 {
                            if let Some(request) = session.load_more() {
                                pages_left -= 1;
                                requests.push(request);
                            }
                        }
                        self.refresh(&session, requests.len());
                        self.log_activity(&session, is_tips);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!("Server closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },

                _ = summary.tick() => {
                    tracing::info!("{}", session.summary());
                }

                _ = shutdown.changed() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }

            for request in requests {
                let text = request.to_json()?;
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    tracing::warn!("Failed to send request, connection lost");
                    break 'outer;
                }
            }
        }

        self.status.write().connected = false;
        tracing::info!("Viewer stopped: {}", session.summary());
        Ok(session)
    }

    fn refresh<R: Renderer>(&self, session: &ViewerSession<R>, requests: usize) {
        let mut status = self.status.write();
        status.stats = session.stats().copied();
        status.node_count = session.graph().node_count();
        status.edge_count = session.graph().edge_count();
        status.events_received += 1;
        status.history_requests += requests as u64;
    }

    fn log_activity<R: Renderer>(&self, session: &ViewerSession<R>, is_tips: bool) {
        if !is_tips {
            return;
        }
        if let Some(log) = session.activity() {
            for entry in log.entries() {
                let kind = if entry.valued() { "valued" } else { "empty" };
                tracing::debug!("[{}] {} ({})", entry.at.format("%H:%M:%S"), entry.line(), kind);
            }
        }
    }
}
