//! HTTP API
//!
//! Read-only JSON endpoints backed by the ingest task:
//! - `GET /health`
//! - `GET /api/stats`
//! - `GET /api/history?index=N`

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tangle_core::TipsPayload;
use tangle_pipeline::PipelineHandle;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub index: u64,
}

/// HTTP API Server
pub struct HttpApiServer {
    pipeline: PipelineHandle,
}

impl HttpApiServer {
    pub fn new(pipeline: PipelineHandle) -> Self {
        Self { pipeline }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // CORS layer to allow browser viewers
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/health", get(health))
            .route("/api/stats", get(stats))
            .route("/api/history", get(history))
            .layer(cors)
            .with_state(self.pipeline)
    }

    /// Bind and run the server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("HTTP API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(State(pipeline): State<PipelineHandle>) -> impl IntoResponse {
    match pipeline.stats().await {
        Some(window) => Ok(Json(window)),
        None => Err((StatusCode::SERVICE_UNAVAILABLE, "pipeline stopped")),
    }
}

async fn history(
    State(pipeline): State<PipelineHandle>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    match pipeline.history_page(query.index).await {
        Some(tips) => Ok(Json(TipsPayload { tips })),
        None => Err((StatusCode::SERVICE_UNAVAILABLE, "pipeline stopped")),
    }
}
