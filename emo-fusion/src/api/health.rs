//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use emo_common::health::HealthResponse;

use crate::AppState;

/// GET /health
///
/// Reports uptime and the number of open real-time sessions.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "fusion".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        active_sessions: Some(state.registry.len().await),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
