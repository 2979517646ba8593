//! Feed source - line-framed text feed over TCP
//!
//! Connects to the upstream publisher, keeps the frames whose topic we
//! subscribe to, and forwards them to the ingest task. Connection loss is
//! logged and retried; it never stops the pipeline.

use std::{io, time::Duration};
use tangle_core::FEED_TOPICS;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    sync::{mpsc, watch},
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("read failed: {0}")]
    Read(#[from] io::Error),
}

/// Feed connection settings
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Publisher address, `host:port`
    pub addr: String,
    /// Topics to keep; other frames are discarded before decoding
    pub topics: Vec<String>,
    /// Delay before reconnecting after the connection drops
    pub reconnect_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5556".to_string(),
            topics: FEED_TOPICS.iter().map(|t| t.to_string()).collect(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// TCP feed client
pub struct TcpFeedSource {
    config: FeedConfig,
}

impl TcpFeedSource {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn subscribed(&self, frame: &str) -> bool {
        let topic = frame.split(' ').next().unwrap_or_default();
        self.config.topics.iter().any(|t| t == topic)
    }

    /// Forward frames until shutdown or until the ingest task goes away
    pub async fn run(
        self,
        frames: mpsc::Sender<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                result = self.stream_once(&frames) => match result {
                    Ok(Continue::Reconnect) => {
                        tracing::warn!("Feed {} closed the connection", self.config.addr);
                    }
                    Ok(Continue::Stop) => return Ok(()),
                    Err(e) => {
                        tracing::warn!("Feed error: {}", e);
                    }
                },
                _ = shutdown.changed() => return Ok(()),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    async fn stream_once(&self, frames: &mpsc::Sender<String>) -> Result<Continue, FeedError> {
        let stream = TcpStream::connect(&self.config.addr)
            .await
            .map_err(|source| FeedError::Connect {
                addr: self.config.addr.clone(),
                source,
            })?;
        tracing::info!(
            "Connected to feed at {} (topics: {})",
            self.config.addr,
            self.config.topics.join(", ")
        );

        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            // A bad frame is dropped; the connection stays up
            let Ok(line) = std::str::from_utf8(&buf) else {
                tracing::debug!("Skipping frame that is not valid UTF-8 ({} bytes)", buf.len());
                continue;
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if !self.subscribed(line) {
                continue;
            }
            if frames.send(line.to_string()).await.is_err() {
                return Ok(Continue::Stop);
            }
        }

        Ok(Continue::Reconnect)
    }
}

enum Continue {
    Reconnect,
    Stop,
}
