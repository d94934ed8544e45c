//! Shared test fixtures
//!
//! A scripted in-process analyzer and canned modality results.

#![allow(dead_code)]

use async_trait::async_trait;
use emo_common::{EmotionDistribution, Modality, ModalityMetadata, ModalityResult};
use emo_fusion::analyzer::{AnalysisRequest, Analyzer, AnalyzerError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted outcome for one modality
#[derive(Clone)]
struct Script {
    outcome: Result<ModalityResult, AnalyzerError>,
    delay: Duration,
}

/// Analyzer returning canned outcomes, recording every call
#[derive(Default)]
pub struct ScriptedAnalyzer {
    scripts: HashMap<Modality, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<AnalysisRequest>>,
}

/// Decrements the in-flight count when a call resolves or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(mut self, result: ModalityResult) -> Self {
        self.scripts.insert(
            result.modality(),
            Script {
                outcome: Ok(result),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn fail(mut self, modality: Modality, error: AnalyzerError) -> Self {
        self.scripts.insert(
            modality,
            Script {
                outcome: Err(error),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Delay every call for `modality` before it resolves
    pub fn with_delay(mut self, modality: Modality, delay: Duration) -> Self {
        if let Some(script) = self.scripts.get_mut(&modality) {
            script.delay = delay;
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever pending at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        request: AnalysisRequest,
        timeout: Duration,
    ) -> Result<ModalityResult, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(pending, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let modality = request.modality();
        self.requests.lock().unwrap().push(request);

        let script = self
            .scripts
            .get(&modality)
            .cloned()
            .unwrap_or(Script {
                outcome: Err(AnalyzerError::Unavailable("not scripted".to_string())),
                delay: Duration::ZERO,
            });

        if tokio::time::timeout(timeout, tokio::time::sleep(script.delay))
            .await
            .is_err()
        {
            return Err(AnalyzerError::Timeout(timeout));
        }
        script.outcome
    }
}

pub fn distribution(scores: &[(&str, f64)]) -> EmotionDistribution {
    scores.iter().map(|(l, s)| (l.to_string(), *s)).collect()
}

fn result(label: &str, confidence: f64, scores: &[(&str, f64)], metadata: ModalityMetadata) -> ModalityResult {
    ModalityResult {
        dominant_emotion: label.to_string(),
        confidence,
        distribution: distribution(scores),
        processing_time: 0.01,
        metadata,
    }
}

pub fn facial(label: &str, confidence: f64, scores: &[(&str, f64)]) -> ModalityResult {
    result(
        label,
        confidence,
        scores,
        ModalityMetadata::Facial {
            face_detected: true,
            face_region: None,
        },
    )
}

pub fn voice(label: &str, confidence: f64, scores: &[(&str, f64)]) -> ModalityResult {
    result(
        label,
        confidence,
        scores,
        ModalityMetadata::Voice {
            audio_duration: 2.0,
            sample_rate: 16000,
        },
    )
}

pub fn text(label: &str, confidence: f64, scores: &[(&str, f64)]) -> ModalityResult {
    result(
        label,
        confidence,
        scores,
        ModalityMetadata::Text {
            text_length: 20,
            detected_language: "en".to_string(),
        },
    )
}
