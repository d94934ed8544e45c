//! Real-time WebSocket channel
//!
//! Session bookkeeping, payload decoding and the per-connection dispatch
//! loop. The axum handler lives in [`crate::api::realtime`].

pub mod dispatcher;
pub mod payload;
pub mod registry;

pub use dispatcher::{write_outbound, RealtimeSettings, SessionDispatcher};
pub use payload::{decode_base64_payload, PayloadError};
pub use registry::{Session, SessionClosed, SessionRegistry, SessionState};
