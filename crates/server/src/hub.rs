//! Viewer Hub - registry of connected viewers
//!
//! Broadcasts fan out through a single tokio broadcast channel; unicasts
//! (welcome, history pages) go through a per-viewer channel owned by that
//! viewer's connection task. A viewer that lets its unicast queue fill up
//! is dropped.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tangle_core::ServerEvent;
use tangle_pipeline::{Transport, ViewerId};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError},
};

/// Serialized event shared by all receivers
pub type Frame = Arc<str>;

/// Capacity of the shared broadcast channel
const BROADCAST_CAPACITY: usize = 1024;

/// Unicasts queued per viewer before it is considered stalled
pub const UNICAST_CAPACITY: usize = 64;

/// Channels handed to a connection task when a viewer registers
pub struct ViewerChannels {
    pub id: ViewerId,
    /// Events addressed to this viewer only
    pub unicast: mpsc::Receiver<Frame>,
    /// Events for every viewer
    pub broadcast: broadcast::Receiver<Frame>,
}

struct ViewerEntry {
    sender: mpsc::Sender<Frame>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct HubStats {
    pub viewers_connected: usize,
    pub total_connections: u64,
    pub broadcasts_sent: u64,
}

/// Manages viewer connections
pub struct ViewerHub {
    /// Connected viewers by ID
    viewers: DashMap<ViewerId, ViewerEntry>,
    /// Fan-out channel for broadcasts
    tx: broadcast::Sender<Frame>,
    /// Next viewer ID
    next_id: AtomicU64,
    stats: RwLock<HubStats>,
}

impl ViewerHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            viewers: DashMap::new(),
            tx,
            next_id: AtomicU64::new(1),
            stats: RwLock::new(HubStats::default()),
        }
    }

    /// Register a new viewer and hand back its channels
    pub fn register(&self) -> ViewerChannels {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, unicast) = mpsc::channel(UNICAST_CAPACITY);

        self.viewers.insert(
            id,
            ViewerEntry {
                sender,
                connected_at: Utc::now(),
            },
        );

        {
            let mut stats = self.stats.write();
            stats.viewers_connected = self.viewers.len();
            stats.total_connections += 1;
        }
        tracing::debug!("Registered viewer {}", id);

        ViewerChannels {
            id,
            unicast,
            broadcast: self.tx.subscribe(),
        }
    }

    /// Remove a viewer. Returns false if it was already gone.
    pub fn unregister(&self, id: ViewerId) -> bool {
        match self.viewers.remove(&id) {
            Some((_, entry)) => {
                self.stats.write().viewers_connected = self.viewers.len();
                let connected_for = Utc::now() - entry.connected_at;
                tracing::debug!(
                    "Removed viewer {} after {}s",
                    id,
                    connected_for.num_seconds()
                );
                true
            }
            None => false,
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_connected(&self, id: ViewerId) -> bool {
        self.viewers.contains_key(&id)
    }

    pub fn stats(&self) -> HubStats {
        self.stats.read().clone()
    }

    fn encode(event: &ServerEvent) -> Option<Frame> {
        match event.to_json() {
            Ok(text) => Some(Frame::from(text)),
            Err(e) => {
                tracing::error!("Failed to encode {} event: {}", event.name(), e);
                None
            }
        }
    }
}

impl Default for ViewerHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ViewerHub {
    fn broadcast(&self, event: &ServerEvent) {
        let Some(frame) = Self::encode(event) else {
            return;
        };

        // No receivers just means nobody is watching
        if let Ok(n) = self.tx.send(frame) {
            self.stats.write().broadcasts_sent += 1;
            tracing::trace!("Broadcast {} to {} viewers", event.name(), n);
        }
    }

    fn unicast(&self, viewer: ViewerId, event: &ServerEvent) -> bool {
        let Some(frame) = Self::encode(event) else {
            return false;
        };

        let result = match self.viewers.get(&viewer) {
            Some(entry) => entry.sender.try_send(frame),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Viewer {} has {} unread replies, disconnecting",
                    viewer,
                    UNICAST_CAPACITY
                );
                self.unregister(viewer);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(viewer);
                false
            }
        }
    }
}
