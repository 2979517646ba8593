//! Integration tests for the ingest service.
//!
//! These run the real service loop with a manual scheduler and a recording
//! transport, feeding frames through the same channel the TCP feed uses.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tangle_core::{MemoryNodeStore, ServerEvent};
use tangle_pipeline::{
    ConfirmationLookup, LookupError, ManualScheduler, Pipeline, PipelineHandle, PipelineService,
    Tick, TickTrigger, Transport, ViewerId,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Default)]
struct RecordingTransport {
    broadcasts: Mutex<Vec<ServerEvent>>,
    unicasts: Mutex<Vec<(ViewerId, ServerEvent)>>,
}

impl Transport for RecordingTransport {
    fn broadcast(&self, event: &ServerEvent) {
        self.broadcasts.lock().push(event.clone());
    }

    fn unicast(&self, viewer: ViewerId, event: &ServerEvent) -> bool {
        self.unicasts.lock().push((viewer, event.clone()));
        true
    }
}

/// Lookup that knows a fixed set of valued hashes
struct FixedLookup {
    valued: Vec<&'static str>,
}

#[async_trait]
impl ConfirmationLookup for FixedLookup {
    async fn value_of(&self, hash: &str) -> Result<Option<f64>, LookupError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if hash == "BROKEN" {
            return Err(LookupError::Api("node unavailable".to_string()));
        }
        let valued = self.valued.iter().any(|v| *v == hash);
        Ok(Some(if valued { 1.0 } else { 0.0 }))
    }
}

struct Harness {
    transport: Arc<RecordingTransport>,
    frames: mpsc::Sender<String>,
    trigger: TickTrigger,
    handle: PipelineHandle,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<Pipeline>>,
}

fn start(lookup: Option<Arc<dyn ConfirmationLookup>>) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = Pipeline::new(Box::new(MemoryNodeStore::new()), transport.clone());
    let (scheduler, trigger) = ManualScheduler::new();
    let (frames, frames_rx) = mpsc::channel(1024);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let (mut service, handle) =
        PipelineService::new(pipeline, Box::new(scheduler), frames_rx, shutdown_rx);
    if let Some(lookup) = lookup {
        service = service.with_lookup(lookup);
    }
    let task = tokio::spawn(service.run());

    Harness {
        transport,
        frames,
        trigger,
        handle,
        shutdown,
        task,
    }
}

impl Harness {
    async fn feed(&self, frames: impl IntoIterator<Item = String>) {
        for frame in frames {
            self.frames.send(frame).await.unwrap();
        }
    }

    /// Wait until the ingest task has applied `count` appends
    async fn wait_for_index(&self, count: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.handle.stats().await.unwrap().index >= count {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("appends were not applied in time");
    }

    async fn wait_for_broadcasts(&self, count: usize) -> Vec<ServerEvent> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let broadcasts = self.transport.broadcasts.lock();
                    if broadcasts.len() >= count {
                        return broadcasts.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("broadcasts did not arrive in time")
    }

    async fn stop(self) -> Pipeline {
        self.shutdown.send(true).unwrap();
        self.task.await.unwrap().unwrap()
    }
}

fn tx(hash: &str, value: &str, trunk: &str, branch: &str) -> String {
    format!("tx {} ADDR {} TAG 0 0 0 BUNDLE {} {}", hash, value, trunk, branch)
}

#[tokio::test]
async fn test_batches_and_stats_flow_through_ticks() {
    let harness = start(None);

    harness
        .feed(vec![
            "lmi 4 5".to_string(),
            "garbage frame".to_string(),
            tx("H1", "10", "T1", "B1"),
            tx("H2", "0", "H1", "H1"),
        ])
        .await;
    harness.wait_for_index(2).await;

    harness.trigger.fire(Tick::Batch);
    let broadcasts = harness.wait_for_broadcasts(1).await;
    match &broadcasts[0] {
        ServerEvent::Tips(payload) => {
            let hashes: Vec<_> = payload.tips.iter().map(|t| t.h.as_str()).collect();
            assert_eq!(hashes, vec!["H1", "H2"]);
        }
        other => panic!("unexpected broadcast {:?}", other),
    }

    // Empty batch tick sends nothing, stats tick always sends
    harness.trigger.fire(Tick::Batch);
    harness.trigger.fire(Tick::Stats);
    let broadcasts = harness.wait_for_broadcasts(2).await;
    match &broadcasts[1] {
        ServerEvent::Stats(window) => {
            assert_eq!(window.tpm, 2);
            assert_eq!(window.tvpm, 1);
            assert_eq!(window.milestone, 5);
        }
        other => panic!("unexpected broadcast {:?}", other),
    }

    harness.trigger.fire(Tick::Stats);
    let broadcasts = harness.wait_for_broadcasts(3).await;
    match &broadcasts[2] {
        ServerEvent::Stats(window) => {
            assert_eq!(window.tpm, 0);
            assert_eq!(window.index, 2);
        }
        other => panic!("unexpected broadcast {:?}", other),
    }

    let pipeline = harness.stop().await;
    assert_eq!(pipeline.counters().batches_broadcast, 1);
    assert_eq!(pipeline.counters().frames_dropped, 1);
}

#[tokio::test]
async fn test_history_paging_is_disjoint() {
    let harness = start(None);
    harness
        .feed((0..300).map(|i| tx(&format!("H{}", i), "0", "T", "B")))
        .await;
    harness.wait_for_index(300).await;

    let mut ranges = Vec::new();
    for index in [250, 150, 50] {
        let page = harness.handle.history_page(index).await.unwrap();
        let first: u64 = page.first().unwrap().h[1..].parse().unwrap();
        let last: u64 = page.last().unwrap().h[1..].parse().unwrap();
        ranges.push((first, last + 1, page.len()));
    }

    assert_eq!(ranges, vec![(150, 250, 100), (50, 150, 100), (0, 50, 50)]);
    harness.stop().await;
}

#[tokio::test]
async fn test_welcome_and_history_requests_are_unicast() {
    let harness = start(None);
    harness
        .feed((0..120).map(|i| tx(&format!("H{}", i), "1", "T", "B")))
        .await;
    harness.wait_for_index(120).await;

    assert!(harness.handle.welcome(3).await);
    assert!(harness.handle.history(3, 120).await);
    // Round trip so both requests above have been handled
    harness.handle.stats().await.unwrap();

    {
        let unicasts = harness.transport.unicasts.lock();
        assert_eq!(unicasts.len(), 2);
        assert!(matches!(&unicasts[0], (3, ServerEvent::Welcome(w)) if w.index == 120));
        assert!(matches!(&unicasts[1], (3, ServerEvent::Tips(p)) if p.tips.len() == 100));
    }
    assert!(harness.transport.broadcasts.lock().is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_remote_lookups_resolve_out_of_band() {
    let lookup: Arc<dyn ConfirmationLookup> = Arc::new(FixedLookup {
        valued: vec!["VALUED"],
    });
    let harness = start(Some(lookup));

    harness
        .feed(vec![
            "sn 1 VALUED".to_string(),
            "sn 2 EMPTY".to_string(),
            "sn 3 BROKEN".to_string(),
            tx("H1", "1", "T", "B"),
        ])
        .await;
    harness.wait_for_index(1).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if harness.handle.stats().await.unwrap().avpm == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("lookups did not resolve");

    let window = harness.handle.stats().await.unwrap();
    assert_eq!(window.apm, 3);
    assert_eq!(window.avpm, 1);
    harness.stop().await;
}
