//! Health check response shared by all services

use serde::{Deserialize, Serialize};

/// GET /health response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Service name (e.g. "fusion")
    pub service: String,
    /// Crate version
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Open real-time sessions, for services that hold any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<usize>,
}
