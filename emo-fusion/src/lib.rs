//! emo-fusion library interface
//!
//! Multimodal emotion fusion service: fans media out to the facial, voice
//! and text analyzers, fuses their distributions, and serves a real-time
//! WebSocket channel for per-modality results.

pub mod analyzer;
pub mod api;
pub mod config;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod orchestrator;
pub mod realtime;

pub use crate::error::{ApiError, ApiResult};

use analyzer::Analyzer;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use config::FusionSettings;
use orchestrator::BatchOrchestrator;
use realtime::{SessionDispatcher, SessionRegistry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub dispatcher: Arc<SessionDispatcher>,
    /// Open real-time sessions
    pub registry: SessionRegistry,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire the orchestrator and dispatcher to one analyzer backend
    pub fn new(analyzer: Arc<dyn Analyzer>, settings: &FusionSettings) -> Self {
        Self {
            orchestrator: Arc::new(BatchOrchestrator::new(
                Arc::clone(&analyzer),
                settings.batch_timeout,
            )),
            dispatcher: Arc::new(SessionDispatcher::new(analyzer, settings.realtime.clone())),
            registry: SessionRegistry::new(),
            startup_time: Utc::now(),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::multimodal_routes())
        .merge(api::realtime_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
