//! End-to-end tests for the viewer endpoints.
//!
//! A real ingest service runs behind the hub; viewers connect over
//! WebSocket and the HTTP router is exercised in-process.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tangle_core::{MemoryNodeStore, ServerEvent, ViewerRequest};
use tangle_pipeline::{
    ManualScheduler, Pipeline, PipelineHandle, PipelineService, Tick, TickTrigger,
};
use tangle_server::{HttpApiServer, ViewerHub, WebSocketServer};
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tower::ServiceExt;

struct Running {
    hub: Arc<ViewerHub>,
    handle: PipelineHandle,
    frames: mpsc::Sender<String>,
    trigger: TickTrigger,
    _shutdown: watch::Sender<bool>,
}

fn start() -> Running {
    let hub = Arc::new(ViewerHub::new());
    let pipeline = Pipeline::new(Box::new(MemoryNodeStore::new()), hub.clone());
    let (scheduler, trigger) = ManualScheduler::new();
    let (frames, frames_rx) = mpsc::channel(1024);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (service, handle) =
        PipelineService::new(pipeline, Box::new(scheduler), frames_rx, shutdown_rx);
    tokio::spawn(service.run());

    Running {
        hub,
        handle,
        frames,
        trigger,
        _shutdown: shutdown,
    }
}

impl Running {
    async fn ingest(&self, count: u64) {
        let start = self.handle.stats().await.unwrap().index;
        for i in start..start + count {
            self.frames
                .send(format!("tx H{} A {} T 0 0 0 B T B", i, i % 2))
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.handle.stats().await.unwrap().index < start + count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("frames were not ingested");
    }
}

async fn next_event<S>(socket: &mut S) -> ServerEvent
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("no message from server")
        .expect("socket closed")
        .expect("socket error");
    match msg {
        Message::Text(text) => ServerEvent::from_json(&text).unwrap(),
        other => panic!("unexpected message {:?}", other),
    }
}

#[tokio::test]
async fn test_viewer_session_over_websocket() {
    let running = start();
    running.ingest(150).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = WebSocketServer::new(running.hub.clone(), running.handle.clone());
    tokio::spawn(server.serve(listener));

    let (mut socket, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let index = match next_event(&mut socket).await {
        ServerEvent::Welcome(window) => window.index,
        other => panic!("expected welcome, got {:?}", other),
    };
    assert_eq!(index, 150);

    let request = ViewerRequest::History(index).to_json().unwrap();
    socket.send(Message::Text(request)).await.unwrap();
    match next_event(&mut socket).await {
        ServerEvent::Tips(payload) => {
            assert_eq!(payload.tips.len(), 100);
            assert_eq!(payload.tips[0].h, "H50");
        }
        other => panic!("expected tips, got {:?}", other),
    }

    // Nothing was flushed yet, so the batch carries every node seen so far
    running.ingest(3).await;
    running.trigger.fire(Tick::Batch);
    match next_event(&mut socket).await {
        ServerEvent::Tips(payload) => {
            assert_eq!(payload.tips.len(), 153);
            assert_eq!(payload.tips[152].h, "H152");
        }
        other => panic!("expected batch, got {:?}", other),
    }

    running.trigger.fire(Tick::Stats);
    match next_event(&mut socket).await {
        ServerEvent::Stats(window) => assert_eq!(window.tpm, 153),
        other => panic!("expected stats, got {:?}", other),
    }

    socket.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while running.hub.viewer_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("viewer was not removed");
}

#[tokio::test]
async fn test_http_api() {
    let running = start();
    running.ingest(10).await;
    running.frames.send("lmi 1 77".to_string()).await.unwrap();
    running.ingest(1).await;

    let router = HttpApiServer::new(running.handle.clone()).router();
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["index"], 11);
    assert_eq!(stats["milestone"], 77);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/history?index=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(page["tips"].as_array().unwrap().len(), 5);
    assert_eq!(page["tips"][0]["h"], "H0");

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
