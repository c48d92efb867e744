//! Web server setup and routing

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .route("/api/health", get(api::health))
        .route("/api/models", get(api::list_models))
        .route("/api/models/{id}", get(api::get_model))
        // Host bridge over WebSocket
        .route("/ws", get(ws::websocket_handler))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server until it fails
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}
