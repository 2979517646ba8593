//! Viewer transport seam
//!
//! The pipeline only knows how to hand events to viewers; connection
//! lifecycle lives with the implementation (see `tangle-server`).

use tangle_core::ServerEvent;

/// Identifier of a connected viewer
pub type ViewerId = u64;

/// Outbound channel to viewers
pub trait Transport: Send + Sync {
    /// Send an event to every connected viewer
    fn broadcast(&self, event: &ServerEvent);

    /// Send an event to a single viewer. Returns false if the viewer is gone.
    fn unicast(&self, viewer: ViewerId, event: &ServerEvent) -> bool;
}
