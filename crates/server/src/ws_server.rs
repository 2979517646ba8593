//! WebSocket Server
//!
//! Viewer transport: each connection gets a welcome, then receives every
//! broadcast plus the replies to its own history requests.

use crate::hub::{ViewerChannels, ViewerHub};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tangle_core::ViewerRequest;
use tangle_pipeline::PipelineHandle;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast::error::RecvError,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// WebSocket Server
pub struct WebSocketServer {
    hub: Arc<ViewerHub>,
    pipeline: PipelineHandle,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new(hub: Arc<ViewerHub>, pipeline: PipelineHandle) -> Self {
        Self { hub, pipeline }
    }

    /// Bind and run the WebSocket server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept viewers on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("WebSocket server listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let hub = self.hub.clone();
                    let pipeline = self.pipeline.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, hub, pipeline).await {
                            tracing::warn!("WebSocket connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single viewer connection
async fn handle_connection(
    stream: TcpStream,
    hub: Arc<ViewerHub>,
    pipeline: PipelineHandle,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let ViewerChannels {
        id,
        mut unicast,
        mut broadcast,
    } = hub.register();
    tracing::info!("Viewer {} connected ({} online)", id, hub.viewer_count());

    pipeline.welcome(id).await;

    // Forward unicasts and broadcasts to this viewer
    let send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = unicast.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                result = broadcast.recv() => match result {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Viewer {} lagged {} messages", id, n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if ws_sender.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    // Handle requests from the viewer
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match ViewerRequest::from_json(&text) {
                Ok(ViewerRequest::History(index)) => {
                    if !pipeline.history(id, index).await {
                        break;
                    }
                }
                Err(_) => {
                    tracing::debug!("Ignoring message from viewer {}: {:.60}", id, text);
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("Viewer {} socket error: {}", id, e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    send_task.abort();
    hub.unregister(id);
    tracing::info!("Viewer {} disconnected ({} online)", id, hub.viewer_count());

    Ok(())
}
