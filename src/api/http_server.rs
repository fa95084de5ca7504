// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::handlers::{health_handler, root_handler};
use super::ocr::ocr_handler;
use crate::config::GatewayConfig;
use crate::engine::EngineHandle;

/// Shared by every request
pub struct AppState {
    pub engine: EngineHandle,
    pub config: GatewayConfig,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: GatewayConfig) -> Self {
        Self { engine, config }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ocr", post(ocr_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener and serve until Ctrl-C
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = state
        .config
        .bind_address()
        .map_err(anyhow::Error::msg)?;

    let app = create_app(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 OCR gateway listening on http://{}", addr);
    info!("   POST /ocr    - multipart field 'image'");
    info!("   GET  /health - health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
