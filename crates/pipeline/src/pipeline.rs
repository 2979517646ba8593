//! Ingest pipeline - the single writer
//!
//! Owns the node store, the stats aggregator and the pending batch. Every
//! feed frame, tick and viewer request is applied here, one at a time, by
//! the ingest task (see [`crate::service`]).

use crate::{
    batch::{BatchBuffer, BroadcastStats},
    lookup::LookupError,
    transport::{Transport, ViewerId},
};
use std::sync::Arc;
use tangle_core::{
    decode_frame, FeedEvent, NodeStore, ServerEvent, StatsAggregator, StatsWindow, StoreError,
    Tip, HISTORY_PAGE_SIZE,
};

/// What handling a frame did
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Node stored under this sequence index
    Appended(u64),
    /// Confirmation counted. When `deferred`, whether it was valued is only
    /// known once [`Pipeline::resolve_confirmation`] is called.
    Confirmed { hash: String, deferred: bool },
    Milestone(u64),
    /// Unrecognized frame, or a store failure
    Dropped,
}

/// Ingest state machine
pub struct Pipeline {
    store: Box<dyn NodeStore>,
    stats: StatsAggregator,
    batch: BatchBuffer,
    transport: Arc<dyn Transport>,
    legacy_tip_events: bool,
    defer_confirmations: bool,
    counters: BroadcastStats,
}

impl Pipeline {
    /// Build a pipeline over a store; the stats index resumes from the store length
    pub fn new(store: Box<dyn NodeStore>, transport: Arc<dyn Transport>) -> Self {
        let stats = StatsAggregator::with_index(store.len());
        Self {
            store,
            stats,
            batch: BatchBuffer::new(),
            transport,
            legacy_tip_events: false,
            defer_confirmations: false,
            counters: BroadcastStats::default(),
        }
    }

    /// Also broadcast every append immediately as a single `tip` event
    pub fn with_legacy_tip_events(mut self, enabled: bool) -> Self {
        self.legacy_tip_events = enabled;
        self
    }

    /// Leave confirmation accounting to an external lookup
    pub fn with_deferred_confirmations(mut self, deferred: bool) -> Self {
        self.defer_confirmations = deferred;
        self
    }

    pub fn defers_confirmations(&self) -> bool {
        self.defer_confirmations
    }

    /// Decode and apply a raw feed frame
    pub fn handle_frame(&mut self, frame: &str) -> FrameOutcome {
        let event = decode_frame(frame);
        if event == FeedEvent::Unrecognized {
            tracing::trace!("Dropping unrecognized frame: {:.40}", frame);
            self.counters.frames_dropped += 1;
            return FrameOutcome::Dropped;
        }
        self.handle_event(event)
    }

    /// Apply a decoded feed event
    pub fn handle_event(&mut self, event: FeedEvent) -> FrameOutcome {
        match event {
            FeedEvent::Append(node) => {
                let tip = Tip::from(&node);
                let value = node.value;
                match self.store.append(node) {
                    Ok(index) => {
                        self.stats.on_append(value);
                        if self.legacy_tip_events {
                            self.transport.broadcast(&ServerEvent::legacy_tip(tip.clone()));
                        }
                        self.batch.push(tip);
                        FrameOutcome::Appended(index)
                    }
                    Err(e) => {
                        tracing::error!("Failed to append node {}: {}", tip.h, e);
                        self.counters.frames_dropped += 1;
                        FrameOutcome::Dropped
                    }
                }
            }

            FeedEvent::Confirm { hash } => {
                let local = match self.store.confirm(&hash) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!("Failed to mark {} confirmed: {}", hash, e);
                        None
                    }
                };

                self.stats.on_confirm();
                if self.defer_confirmations {
                    FrameOutcome::Confirmed {
                        hash,
                        deferred: true,
                    }
                } else {
                    self.resolve_confirmation(&hash, Ok(local));
                    FrameOutcome::Confirmed {
                        hash,
                        deferred: false,
                    }
                }
            }

            FeedEvent::MilestoneUpdate { milestone } => {
                self.stats.on_milestone(milestone);
                tracing::debug!("Milestone {}", milestone);
                FrameOutcome::Milestone(milestone)
            }

            FeedEvent::Unrecognized => {
                self.counters.frames_dropped += 1;
                FrameOutcome::Dropped
            }
        }
    }

    /// Apply the result of a confirmation lookup. The confirmation itself was
    /// already counted when its frame arrived.
    ///
    /// Unknown hashes and failed lookups count as unvalued confirmations.
    pub fn resolve_confirmation(&mut self, hash: &str, result: Result<Option<f64>, LookupError>) {
        let was_valued = match result {
            Ok(Some(value)) => value > 0.0,
            Ok(None) => {
                tracing::debug!("Confirmation for unknown node {}", hash);
                false
            }
            Err(e) => {
                tracing::warn!("Confirmation lookup for {} failed: {}", hash, e);
                false
            }
        };
        if was_valued {
            self.stats.on_valued_confirm();
        }
    }

    /// Stats tick: always broadcast, then reset the per-tick counters
    pub fn stats_tick(&mut self) -> StatsWindow {
        let window = self.stats.snapshot();
        self.transport.broadcast(&ServerEvent::Stats(window));
        self.counters.stats_broadcast += 1;

        tracing::info!(
            "Stats: {} tx ({} valued, {} i), {} confirmed ({} valued), milestone {}, {} total",
            window.tpm,
            window.tvpm,
            window.ipm,
            window.apm,
            window.avpm,
            window.milestone,
            window.index
        );

        window
    }

    /// Batch tick: broadcast pending nodes, if any. Returns how many were sent.
    pub fn batch_tick(&mut self) -> usize {
        let Some(tips) = self.batch.take() else {
            return 0;
        };

        let count = tips.len();
        self.transport.broadcast(&ServerEvent::tips(tips));
        self.counters.batches_broadcast += 1;
        self.counters.tips_broadcast += count as u64;

        tracing::debug!("Broadcast batch of {} tips", count);
        count
    }

    /// Greet a newly connected viewer
    pub fn welcome(&self, viewer: ViewerId) {
        let window = self.stats.current();
        if !self.transport.unicast(viewer, &ServerEvent::Welcome(window)) {
            tracing::debug!("Viewer {} left before welcome", viewer);
        }
    }

    /// Answer a viewer's history request privately
    pub fn history(&mut self, viewer: ViewerId, index: u64) {
        let tips = match self.history_page(index) {
            Ok(tips) => tips,
            Err(e) => {
                tracing::error!("History query before {} failed: {}", index, e);
                Vec::new()
            }
        };

        tracing::debug!(
            "Viewer {} history before {}: {} tips",
            viewer,
            index,
            tips.len()
        );
        self.counters.history_pages_served += 1;
        self.transport.unicast(viewer, &ServerEvent::tips(tips));
    }

    /// Nodes in `[index - 100, index)`, ascending
    pub fn history_page(&self, index: u64) -> Result<Vec<Tip>, StoreError> {
        Ok(self
            .store
            .range_before(index, HISTORY_PAGE_SIZE)?
            .iter()
            .map(|record| record.to_tip())
            .collect())
    }

    /// Current stats without resetting anything
    pub fn stats(&self) -> StatsWindow {
        self.stats.current()
    }

    pub fn pending_batch(&self) -> usize {
        self.batch.len()
    }

    pub fn counters(&self) -> &BroadcastStats {
        &self.counters
    }

    /// Flush the store before shutdown
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }
}
