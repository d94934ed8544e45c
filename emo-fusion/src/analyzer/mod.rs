//! Analyzer Client
//!
//! One request to one analyzer backend, bounded by a caller-supplied
//! timeout. Every failure comes back as an [`AnalyzerError`] value; callers
//! decide whether a failure matters (the orchestrator excludes it from
//! fusion, the real-time dispatcher reports it to the client).

pub mod http_client;

pub use http_client::HttpAnalyzerClient;

use async_trait::async_trait;
use emo_common::{Modality, ModalityResult};
use std::time::Duration;
use thiserror::Error;

/// Analyzer call failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    /// Backend unreachable or reporting itself unavailable (model not loaded)
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),

    #[error("Analyzer timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed or out-of-contract reply
    #[error("Bad analyzer response: {0}")]
    BadResponse(String),

    /// Backend rejected the input (wrong content type, empty text, ...)
    #[error("Input rejected by analyzer: {0}")]
    ValidationRejected(String),
}

/// Uploaded or decoded media bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl MediaPayload {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: content_type.into(),
        }
    }

    /// Single video frame as sent by the real-time client
    pub fn frame(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "frame.jpg", "image/jpeg")
    }

    /// Audio chunk as recorded by the real-time client
    pub fn audio_chunk(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "audio_chunk.webm", "audio/webm")
    }
}

/// Modality-specific analyzer input
///
/// The variant determines which backend is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    Image(MediaPayload),
    Audio(MediaPayload),
    Text { text: String, language: String },
}

impl AnalysisRequest {
    pub fn modality(&self) -> Modality {
        match self {
            AnalysisRequest::Image(_) => Modality::Facial,
            AnalysisRequest::Audio(_) => Modality::Voice,
            AnalysisRequest::Text { .. } => Modality::Text,
        }
    }
}

/// A single-modality emotion analyzer
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one payload within `timeout`
    async fn analyze(
        &self,
        request: AnalysisRequest,
        timeout: Duration,
    ) -> Result<ModalityResult, AnalyzerError>;
}
