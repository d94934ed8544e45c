//! Batch Orchestrator
//!
//! Fans one multimodal request out to the analyzers concurrently, waits for
//! every call to finish, and fuses whatever succeeded. Per-modality failures
//! are isolated: they are logged and excluded, and only surface when no
//! modality succeeded at all.

use crate::analyzer::{AnalysisRequest, Analyzer, AnalyzerError, MediaPayload};
use crate::fusion::{self, FusionError, FusionMethod, Weights};
use chrono::{DateTime, Utc};
use emo_common::{EmotionDistribution, Modality, ModalityResult};
use futures::future::join_all;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// One-shot multimodal request; every input is optional
#[derive(Debug, Clone, Default)]
pub struct MultimodalRequest {
    pub image: Option<MediaPayload>,
    pub audio: Option<MediaPayload>,
    pub text: Option<String>,
    pub language: Option<String>,
}

impl MultimodalRequest {
    /// Analyzer calls to issue, one per usable input
    ///
    /// Zero-byte uploads and whitespace-only text count as absent.
    fn analysis_requests(self) -> Vec<AnalysisRequest> {
        let language = self
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "auto".to_string());

        let mut requests = Vec::with_capacity(3);
        if let Some(image) = self.image.filter(|m| !m.bytes.is_empty()) {
            requests.push(AnalysisRequest::Image(image));
        }
        if let Some(audio) = self.audio.filter(|m| !m.bytes.is_empty()) {
            requests.push(AnalysisRequest::Audio(audio));
        }
        if let Some(text) = self.text.filter(|t| !t.trim().is_empty()) {
            requests.push(AnalysisRequest::Text { text, language });
        }
        requests
    }
}

/// Individual analyzer results carried on the fused response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerModalityResults {
    pub facial_result: Option<ModalityResult>,
    pub voice_result: Option<ModalityResult>,
    pub text_result: Option<ModalityResult>,
}

impl PerModalityResults {
    fn from_results(results: &BTreeMap<Modality, ModalityResult>) -> Self {
        Self {
            facial_result: results.get(&Modality::Facial).cloned(),
            voice_result: results.get(&Modality::Voice).cloned(),
            text_result: results.get(&Modality::Text).cloned(),
        }
    }

    pub fn get(&self, modality: Modality) -> Option<&ModalityResult> {
        match modality {
            Modality::Facial => self.facial_result.as_ref(),
            Modality::Voice => self.voice_result.as_ref(),
            Modality::Text => self.text_result.as_ref(),
        }
    }
}

/// Final fused judgment for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub final_emotion: String,
    pub final_confidence: f64,
    #[serde(rename = "all_emotions")]
    pub distribution: EmotionDistribution,
    #[serde(flatten)]
    pub per_modality: PerModalityResults,
    #[serde(rename = "modalities_used")]
    pub contributing_modalities: Vec<Modality>,
    pub fusion_method: FusionMethod,
    /// End-to-end wall time across the whole fan-out
    #[serde(rename = "total_processing_time", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub timestamp: DateTime<Utc>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// One failed modality, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalityFailure {
    pub modality: Modality,
    pub error: AnalyzerError,
}

impl fmt::Display for ModalityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.modality, self.error)
    }
}

/// Orchestration failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("At least one modality (image, audio or text) must be provided")]
    NoModalityProvided,

    #[error("No analysis could be completed; check the analyzer service logs ({})", format_failures(.0))]
    AllModalitiesFailed(Vec<ModalityFailure>),

    #[error("Fusion failed: {0}")]
    Fusion(#[from] FusionError),
}

fn format_failures(failures: &[ModalityFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Drives concurrent analyzer calls and fuses the successes
pub struct BatchOrchestrator {
    analyzer: Arc<dyn Analyzer>,
    timeout: Duration,
}

impl BatchOrchestrator {
    /// # Arguments
    /// * `analyzer` - Backend used for every modality
    /// * `timeout` - Per-call timeout applied to each modality
    pub fn new(analyzer: Arc<dyn Analyzer>, timeout: Duration) -> Self {
        Self { analyzer, timeout }
    }

    /// Analyze every provided input and return the fused result
    ///
    /// Calls run concurrently and independently; fusion starts only once all
    /// of them have completed. Each successful modality is weighted by its
    /// own confidence. Failed calls are never retried.
    pub async fn orchestrate(
        &self,
        request: MultimodalRequest,
    ) -> Result<FusedResult, OrchestrationError> {
        let start = Instant::now();

        let requests = request.analysis_requests();
        if requests.is_empty() {
            return Err(OrchestrationError::NoModalityProvided);
        }

        info!(
            modalities = requests.len(),
            "Starting multimodal analysis"
        );

        let calls = requests.into_iter().map(|request| {
            let analyzer = Arc::clone(&self.analyzer);
            let timeout = self.timeout;
            async move {
                let modality = request.modality();
                (modality, analyzer.analyze(request, timeout).await)
            }
        });

        let mut results = BTreeMap::new();
        let mut failures = Vec::new();

        for (modality, outcome) in join_all(calls).await {
            match outcome {
                Ok(result) => {
                    info!(
                        modality = %modality,
                        emotion = %result.dominant_emotion,
                        confidence = result.confidence,
                        "Modality analysis completed"
                    );
                    results.insert(modality, result);
                }
                Err(error) => {
                    warn!(
                        modality = %modality,
                        error = %error,
                        "Modality analysis failed, excluding from fusion"
                    );
                    failures.push(ModalityFailure { modality, error });
                }
            }
        }

        if results.is_empty() {
            return Err(OrchestrationError::AllModalitiesFailed(failures));
        }

        let weights: Weights = results
            .iter()
            .map(|(modality, result)| (*modality, result.confidence))
            .collect();

        let fusion = fusion::fuse(&results, Some(&weights))?;
        let elapsed = start.elapsed();

        info!(
            emotion = %fusion.final_emotion,
            confidence = fusion.final_confidence,
            modalities = fusion.contributing_modalities.len(),
            failed = failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fused multimodal result"
        );

        Ok(FusedResult {
            final_emotion: fusion.final_emotion,
            final_confidence: fusion.final_confidence,
            distribution: fusion.distribution,
            per_modality: PerModalityResults::from_results(&results),
            contributing_modalities: fusion.contributing_modalities,
            fusion_method: fusion.method,
            elapsed,
            timestamp: Utc::now(),
        })
    }
}
