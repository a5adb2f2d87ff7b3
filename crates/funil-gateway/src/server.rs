// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state, and serves until the
//! cancellation token fires.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use funil_agent::{HandoffService, QueueHandle};
use funil_core::FunilError;
use funil_followup::FollowupWorker;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Producer side of the inbound worker queue.
    pub queue: QueueHandle,
    /// Dispatcher handle for the manual sweep hook.
    pub sweeper: Arc<FollowupWorker>,
    /// Operator actions (handoff, close).
    pub handoff: Arc<HandoffService>,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Gateway server configuration (mirrors `GatewayConfig` from funil-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the gateway router. Exposed separately for in-process tests.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/webhook/zapi", post(handlers::post_webhook))
        .route("/health", get(handlers::get_health))
        .route("/admin/sweep", post(handlers::post_sweep))
        .route(
            "/admin/conversations/{id}/handoff",
            post(handlers::post_handoff),
        )
        .route(
            "/admin/conversations/{id}/close",
            post(handlers::post_close),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server and serve until cancellation.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), FunilError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FunilError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| FunilError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
