//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Basic health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: String,
}

/// Basic health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Liveness check (is the process running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check (can the database be reached)
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.db_pool.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
