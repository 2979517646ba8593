//! Ingest service - runs the pipeline on a single task
//!
//! Feed frames, scheduler ticks, resolved confirmation lookups and viewer
//! requests are multiplexed onto one loop, so the pipeline state has exactly
//! one writer and no tick handler can run twice at once.

use crate::{
    lookup::{ConfirmationLookup, LookupError},
    pipeline::{FrameOutcome, Pipeline},
    scheduler::{Scheduler, Tick},
    transport::ViewerId,
};
use std::sync::Arc;
use tangle_core::{StatsWindow, Tip};
use tokio::sync::{mpsc, oneshot, watch};

/// Capacity of the request channel shared by all viewers
const REQUEST_CHANNEL_CAPACITY: usize = 1024;

/// Requests handled by the ingest task on behalf of viewers and the HTTP API
#[derive(Debug)]
pub enum PipelineRequest {
    /// A viewer connected; send it a welcome
    Welcome { viewer: ViewerId },
    /// A viewer asked for the page before `index`
    History { viewer: ViewerId, index: u64 },
    /// Read the current stats window
    Stats { reply: oneshot::Sender<StatsWindow> },
    /// Read a history page without a viewer connection
    HistoryPage {
        index: u64,
        reply: oneshot::Sender<Vec<Tip>>,
    },
}

/// Cloneable handle for talking to the ingest task
#[derive(Clone, Debug)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineRequest>,
}

impl PipelineHandle {
    pub async fn welcome(&self, viewer: ViewerId) -> bool {
        self.tx.send(PipelineRequest::Welcome { viewer }).await.is_ok()
    }

    pub async fn history(&self, viewer: ViewerId, index: u64) -> bool {
        self.tx
            .send(PipelineRequest::History { viewer, index })
            .await
            .is_ok()
    }

    /// `None` once the ingest task has stopped
    pub async fn stats(&self) -> Option<StatsWindow> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PipelineRequest::Stats { reply }).await.ok()?;
        rx.await.ok()
    }

    /// `None` once the ingest task has stopped
    pub async fn history_page(&self, index: u64) -> Option<Vec<Tip>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PipelineRequest::HistoryPage { index, reply })
            .await
            .ok()?;
        rx.await.ok()
    }
}

/// Result of a lookup, returned to the ingest task
type Resolved = (String, Result<Option<f64>, LookupError>);

/// The ingest loop and everything it owns
pub struct PipelineService {
    pipeline: Pipeline,
    scheduler: Box<dyn Scheduler>,
    lookup: Option<Arc<dyn ConfirmationLookup>>,
    frames: mpsc::Receiver<String>,
    requests: mpsc::Receiver<PipelineRequest>,
    shutdown: watch::Receiver<bool>,
}

impl PipelineService {
    pub fn new(
        pipeline: Pipeline,
        scheduler: Box<dyn Scheduler>,
        frames: mpsc::Receiver<String>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, PipelineHandle) {
        let (tx, requests) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let service = Self {
            pipeline,
            scheduler,
            lookup: None,
            frames,
            requests,
            shutdown,
        };
        (service, PipelineHandle { tx })
    }

    /// Resolve confirmations through an external lookup instead of the store
    pub fn with_lookup(mut self, lookup: Arc<dyn ConfirmationLookup>) -> Self {
        self.pipeline = self.pipeline.with_deferred_confirmations(true);
        self.lookup = Some(lookup);
        self
    }

    /// Run until shutdown is signalled. Returns the pipeline for inspection.
    pub async fn run(mut self) -> anyhow::Result<Pipeline> {
        let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<Resolved>();
        let mut feed_open = true;
        let mut ticks_open = true;

        tracing::info!("Ingest pipeline started");

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }

                frame = self.frames.recv(), if feed_open => match frame {
                    Some(frame) => {
                        let outcome = self.pipeline.handle_frame(&frame);
                        if let FrameOutcome::Confirmed { hash, deferred: true } = outcome {
                            self.spawn_lookup(hash, resolved_tx.clone());
                        }
                    }
                    None => {
                        tracing::warn!("Feed channel closed, serving viewers without new frames");
                        feed_open = false;
                    }
                },

                tick = self.scheduler.next_tick(), if ticks_open => match tick {
                    Some(Tick::Stats) => {
                        self.pipeline.stats_tick();
                    }
                    Some(Tick::Batch) => {
                        self.pipeline.batch_tick();
                    }
                    None => {
                        tracing::warn!("Scheduler exhausted, no further broadcasts");
                        ticks_open = false;
                    }
                },

                Some((hash, result)) = resolved_rx.recv() => {
                    self.pipeline.resolve_confirmation(&hash, result);
                }

                Some(request) = self.requests.recv() => {
                    self.handle_request(request);
                }
            }
        }

        // Timers stop with the scheduler; nothing fires after this point.
        drop(self.scheduler);

        if let Err(e) = self.pipeline.close() {
            tracing::error!("Failed to flush node store: {}", e);
        }

        let counters = self.pipeline.counters();
        tracing::info!(
            "Ingest pipeline stopped: {} batches ({} tips), {} stats, {} history pages, {} frames dropped",
            counters.batches_broadcast,
            counters.tips_broadcast,
            counters.stats_broadcast,
            counters.history_pages_served,
            counters.frames_dropped
        );

        Ok(self.pipeline)
    }

    fn handle_request(&mut self, request: PipelineRequest) {
        match request {
            PipelineRequest::Welcome { viewer } => self.pipeline.welcome(viewer),
            PipelineRequest::History { viewer, index } => self.pipeline.history(viewer, index),
            PipelineRequest::Stats { reply } => {
                let _ = reply.send(self.pipeline.stats());
            }
            PipelineRequest::HistoryPage { index, reply } => {
                let tips = match self.pipeline.history_page(index) {
                    Ok(tips) => tips,
                    Err(e) => {
                        tracing::error!("History query before {} failed: {}", index, e);
                        Vec::new()
                    }
                };
                let _ = reply.send(tips);
            }
        }
    }

    fn spawn_lookup(&self, hash: String, resolved: mpsc::UnboundedSender<Resolved>) {
        let Some(lookup) = self.lookup.clone() else {
            let _ = resolved.send((hash, Ok(None)));
            return;
        };

        tokio::spawn(async move {
            let result = lookup.value_of(&hash).await;
            // The ingest loop may already be gone during shutdown
            let _ = resolved.send((hash, result));
        });
    }
}
