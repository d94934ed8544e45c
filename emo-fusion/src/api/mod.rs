//! HTTP API handlers for emo-fusion
//!
//! One-shot multimodal analysis over multipart HTTP, the real-time
//! WebSocket channel, and health.

pub mod health;
pub mod multimodal;
pub mod realtime;

pub use health::health_routes;
pub use multimodal::multimodal_routes;
pub use realtime::realtime_routes;
