mod app_error;
mod handlers;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tracing::info;

use crate::{
    publish::{PublishMode, PublishPipeline},
    server::handlers::{health, method_not_allowed, render_metrics, send_event},
    telemetry::Metrics,
};

/// Shared application state.
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub pipeline: Arc<PublishPipeline>,
    pub publish_mode: PublishMode,
    pub truncation_limit: usize,
}

/// Creates the router. Used for testing, too.
pub fn make_server(state: AppState) -> Router {
    Router::new()
        .route("/api/send", post(send_event).fallback(method_not_allowed))
        .route("/metrics", get(render_metrics))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

/// Starts the server on the given port.
pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let app = make_server(state);

    info!("Listening on http://localhost:{port}");
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("Failed to bind to port {port}"))?;

    axum::serve(listener, app)
        .await
        .with_context(|| "Failed to start server")
}
