//! Real-time channel message types
//!
//! JSON text frames tagged by `type`. Inbound frames come from the browser
//! client, outbound frames are pushed back on the same connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::{Modality, ModalityResult};

fn default_language() -> String {
    "auto".to_string()
}

/// Client → server message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Video frame as base64 or data-URI string
    AnalyzeFrame { image: String },
    /// Audio chunk as base64 or data-URI string
    AnalyzeAudio { audio: String },
    AnalyzeText {
        text: String,
        #[serde(default = "default_language")]
        language: String,
    },
    /// Keepalive
    Ping,
}

impl InboundMessage {
    /// Modality the message targets (`None` for keepalive)
    pub fn modality(&self) -> Option<Modality> {
        match self {
            InboundMessage::AnalyzeFrame { .. } => Some(Modality::Facial),
            InboundMessage::AnalyzeAudio { .. } => Some(Modality::Voice),
            InboundMessage::AnalyzeText { .. } => Some(Modality::Text),
            InboundMessage::Ping => None,
        }
    }
}

/// Server → client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Welcome message sent once the session is open
    Connected {
        message: String,
        timestamp: DateTime<Utc>,
    },
    AnalysisResult {
        modality: Modality,
        result: ModalityResult,
        timestamp: DateTime<Utc>,
    },
    Error {
        modality: Modality,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Pong { timestamp: DateTime<Utc> },
}

impl OutboundMessage {
    pub fn connected(message: impl Into<String>) -> Self {
        OutboundMessage::Connected {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn analysis_result(modality: Modality, result: ModalityResult) -> Self {
        OutboundMessage::AnalysisResult {
            modality,
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn error(modality: Modality, message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            modality,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        OutboundMessage::Pong { timestamp: Utc::now() }
    }

    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Connected { .. } => "connected",
            OutboundMessage::AnalysisResult { .. } => "analysis_result",
            OutboundMessage::Error { .. } => "error",
            OutboundMessage::Pong { .. } => "pong",
        }
    }
}
