//! HTTP analyzer client
//!
//! Talks to the facial, voice and text analyzer services:
//! - `POST {facial}/analyze/face`  multipart field `file`
//! - `POST {voice}/analyze/voice`  multipart field `file`
//! - `POST {text}/analyze/text`    JSON `{text, language}`
//!
//! One pooled `reqwest::Client` is shared by all calls. The per-call timeout
//! covers connect, request and body read.

use super::{AnalysisRequest, Analyzer, AnalyzerError, MediaPayload};
use async_trait::async_trait;
use emo_common::config::AnalyzerEndpoints;
use emo_common::emotion::FaceRegion;
use emo_common::{EmotionDistribution, Modality, ModalityMetadata, ModalityResult};
use reqwest::{multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const USER_AGENT: &str = concat!("emo-fusion/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw analyzer reply, before contract validation
#[derive(Debug, Deserialize)]
struct AnalyzerReply {
    emotion: String,
    confidence: f64,
    all_emotions: EmotionDistribution,
    #[serde(default)]
    processing_time: f64,
    // facial
    face_detected: Option<bool>,
    face_region: Option<FaceRegion>,
    // voice
    audio_duration: Option<f64>,
    sample_rate: Option<u32>,
    // text
    text_length: Option<usize>,
    detected_language: Option<String>,
}

impl AnalyzerReply {
    /// Validate against the analyzer contract and attach modality metadata
    fn into_result(self, modality: Modality) -> Result<ModalityResult, AnalyzerError> {
        if self.emotion.trim().is_empty() {
            return Err(AnalyzerError::BadResponse("empty emotion label".to_string()));
        }
        if !is_probability(self.confidence) {
            return Err(AnalyzerError::BadResponse(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.all_emotions.is_empty() {
            return Err(AnalyzerError::BadResponse("empty emotion distribution".to_string()));
        }
        if let Some((label, score)) = self
            .all_emotions
            .iter()
            .find(|(_, score)| !is_probability(**score))
        {
            return Err(AnalyzerError::BadResponse(format!(
                "score {} for '{}' outside [0, 1]",
                score, label
            )));
        }

        let missing = |field: &str| {
            AnalyzerError::BadResponse(format!("{} reply missing '{}'", modality, field))
        };

        let metadata = match modality {
            Modality::Facial => ModalityMetadata::Facial {
                face_detected: self.face_detected.ok_or_else(|| missing("face_detected"))?,
                face_region: self.face_region,
            },
            Modality::Voice => ModalityMetadata::Voice {
                audio_duration: self.audio_duration.ok_or_else(|| missing("audio_duration"))?,
                sample_rate: self.sample_rate.ok_or_else(|| missing("sample_rate"))?,
            },
            Modality::Text => ModalityMetadata::Text {
                text_length: self.text_length.ok_or_else(|| missing("text_length"))?,
                detected_language: self
                    .detected_language
                    .ok_or_else(|| missing("detected_language"))?,
            },
        };

        Ok(ModalityResult {
            dominant_emotion: self.emotion,
            confidence: self.confidence,
            distribution: self.all_emotions,
            processing_time: self.processing_time,
            metadata,
        })
    }
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[derive(Serialize)]
struct TextBody<'a> {
    text: &'a str,
    language: &'a str,
}

/// Production [`Analyzer`] backed by the analyzer HTTP services
pub struct HttpAnalyzerClient {
    http_client: Client,
    endpoints: AnalyzerEndpoints,
}

impl HttpAnalyzerClient {
    pub fn new(endpoints: AnalyzerEndpoints) -> Result<Self, AnalyzerError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AnalyzerError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoints,
        })
    }

    fn url(&self, modality: Modality) -> String {
        let (base, path) = match modality {
            Modality::Facial => (&self.endpoints.facial_url, "analyze/face"),
            Modality::Voice => (&self.endpoints.voice_url, "analyze/voice"),
            Modality::Text => (&self.endpoints.text_url, "analyze/text"),
        };
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: AnalysisRequest,
        timeout: Duration,
    ) -> Result<ModalityResult, AnalyzerError> {
        let modality = request.modality();
        let url = self.url(modality);

        let builder = match request {
            AnalysisRequest::Image(media) | AnalysisRequest::Audio(media) => {
                let form = multipart::Form::new().part("file", file_part(media)?);
                self.http_client.post(&url).multipart(form)
            }
            AnalysisRequest::Text { text, language } => self.http_client.post(&url).json(&TextBody {
                text: &text,
                language: &language,
            }),
        };

        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let reply: AnalyzerReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AnalyzerError::Timeout(timeout)
            } else {
                AnalyzerError::BadResponse(e.to_string())
            }
        })?;

        reply.into_result(modality)
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzerClient {
    async fn analyze(
        &self,
        request: AnalysisRequest,
        timeout: Duration,
    ) -> Result<ModalityResult, AnalyzerError> {
        let modality = request.modality();
        let start = Instant::now();

        debug!(modality = %modality, timeout_ms = timeout.as_millis() as u64, "Calling analyzer");

        let result = match tokio::time::timeout(timeout, self.send(request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(AnalyzerError::Timeout(timeout)),
        };

        match &result {
            Ok(r) => debug!(
                modality = %modality,
                emotion = %r.dominant_emotion,
                confidence = r.confidence,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Analyzer call succeeded"
            ),
            Err(e) => debug!(
                modality = %modality,
                error = %e,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Analyzer call failed"
            ),
        }

        result
    }
}

fn file_part(media: MediaPayload) -> Result<multipart::Part, AnalyzerError> {
    multipart::Part::bytes(media.bytes)
        .file_name(media.file_name)
        .mime_str(&media.content_type)
        .map_err(|_| {
            AnalyzerError::ValidationRejected(format!("invalid content type '{}'", media.content_type))
        })
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout(timeout)
    } else if e.is_decode() {
        AnalyzerError::BadResponse(e.to_string())
    } else {
        AnalyzerError::Unavailable(e.to_string())
    }
}

/// Map a non-2xx analyzer status
fn status_error(status: StatusCode, body: &str) -> AnalyzerError {
    let detail = error_detail(body);
    match status {
        StatusCode::SERVICE_UNAVAILABLE => {
            AnalyzerError::Unavailable(format!("{}: {}", status.as_u16(), detail))
        }
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => AnalyzerError::ValidationRejected(detail),
        _ => AnalyzerError::BadResponse(format!("HTTP {}: {}", status.as_u16(), detail)),
    }
}

/// Pull `detail` out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_string())
}
