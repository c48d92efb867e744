//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn bridge_unavailable(e: impl std::fmt::Display) -> axum::response::Response {
    warn!(error = %e, "Host bridge unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError::new(format!("Host bridge unavailable: {}", e))),
    )
        .into_response()
}

/// Liveness and loaded-model count
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.bridge.models().await {
        Ok(models) => Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "models": models.len(),
        }))
        .into_response(),
        Err(e) => bridge_unavailable(e),
    }
}

/// List all loaded models
pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.bridge.models().await {
        Ok(models) => Json(models).into_response(),
        Err(e) => bridge_unavailable(e),
    }
}

/// Get a specific model by ID
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.bridge.models().await {
        Ok(models) => match models.into_iter().find(|m| m.id == id) {
            Some(model) => Json(model).into_response(),
            None => (StatusCode::NOT_FOUND, Json(ApiError::new("Model not found"))).into_response(),
        },
        Err(e) => bridge_unavailable(e),
    }
}
