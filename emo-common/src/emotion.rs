//! Modality and emotion result types
//!
//! These types mirror the JSON contract every analyzer backend speaks:
//! `{emotion, confidence, all_emotions, processing_time, <modality fields>}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Emotion label → score in [0, 1]
///
/// Ordered by label so iteration, serialization and tie-breaking are
/// deterministic.
pub type EmotionDistribution = BTreeMap<String, f64>;

/// One analysis input channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Facial expression analysis of an image
    Facial,
    /// Speech emotion analysis of an audio clip
    Voice,
    /// Sentiment/emotion analysis of text
    Text,
}

impl Modality {
    /// All modalities in canonical order
    pub const ALL: [Modality; 3] = [Modality::Facial, Modality::Voice, Modality::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Facial => "facial",
            Modality::Voice => "voice",
            Modality::Text => "text",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facial" => Ok(Modality::Facial),
            "voice" => Ok(Modality::Voice),
            "text" => Ok(Modality::Text),
            other => Err(crate::Error::InvalidInput(format!("Unknown modality: {}", other))),
        }
    }
}

/// Bounding box of a detected face, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Modality-specific fields reported alongside the emotion distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModalityMetadata {
    Facial {
        face_detected: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        face_region: Option<FaceRegion>,
    },
    Voice {
        /// Clip duration in seconds
        audio_duration: f64,
        sample_rate: u32,
    },
    Text {
        text_length: usize,
        detected_language: String,
    },
}

impl ModalityMetadata {
    /// Modality this metadata belongs to
    pub fn modality(&self) -> Modality {
        match self {
            ModalityMetadata::Facial { .. } => Modality::Facial,
            ModalityMetadata::Voice { .. } => Modality::Voice,
            ModalityMetadata::Text { .. } => Modality::Text,
        }
    }
}

/// Normalized result of one analyzer call
///
/// Immutable once returned by the analyzer client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityResult {
    /// Dominant emotion label
    #[serde(rename = "emotion")]
    pub dominant_emotion: String,

    /// Analyzer confidence (0.0-1.0)
    pub confidence: f64,

    /// Full emotion distribution
    #[serde(rename = "all_emotions")]
    pub distribution: EmotionDistribution,

    /// Backend-side processing time in seconds
    pub processing_time: f64,

    #[serde(flatten)]
    pub metadata: ModalityMetadata,
}

impl ModalityResult {
    pub fn modality(&self) -> Modality {
        self.metadata.modality()
    }
}

/// Label with the highest score
///
/// Ties resolve to the label that sorts first. Returns `None` for an empty
/// distribution.
pub fn dominant_emotion(distribution: &EmotionDistribution) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (label, &score) in distribution {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((label.as_str(), score)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dist(pairs: &[(&str, f64)]) -> EmotionDistribution {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_modality_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Modality::Facial).unwrap(), json!("facial"));
        assert_eq!(serde_json::to_value(Modality::Voice).unwrap(), json!("voice"));
        assert_eq!("TEXT".parse::<Modality>().unwrap(), Modality::Text);
        assert!("smell".parse::<Modality>().is_err());
    }

    #[test]
    fn test_modality_order_is_canonical() {
        let mut mods = vec![Modality::Text, Modality::Facial, Modality::Voice];
        mods.sort();
        assert_eq!(mods, Modality::ALL.to_vec());
    }

    #[test]
    fn test_dominant_emotion_tie_breaks_lexically() {
        let d = dist(&[("sad", 0.4), ("angry", 0.4), ("happy", 0.2)]);
        assert_eq!(dominant_emotion(&d), Some(("angry", 0.4)));
        assert_eq!(dominant_emotion(&EmotionDistribution::new()), None);
    }

    #[test]
    fn test_voice_result_parses_analyzer_payload() {
        let payload = json!({
            "emotion": "angry",
            "confidence": 0.81,
            "all_emotions": {"angry": 0.81, "neutral": 0.19},
            "processing_time": 0.42,
            "audio_duration": 3.5,
            "sample_rate": 16000
        });

        let result: ModalityResult = serde_json::from_value(payload).unwrap();
        assert_eq!(result.modality(), Modality::Voice);
        assert_eq!(result.dominant_emotion, "angry");
        assert_eq!(result.distribution.len(), 2);
        assert_eq!(
            result.metadata,
            ModalityMetadata::Voice { audio_duration: 3.5, sample_rate: 16000 }
        );
    }

    #[test]
    fn test_facial_result_serializes_flat() {
        let result = ModalityResult {
            dominant_emotion: "happy".to_string(),
            confidence: 0.9,
            distribution: dist(&[("happy", 0.9), ("neutral", 0.1)]),
            processing_time: 0.1,
            metadata: ModalityMetadata::Facial { face_detected: true, face_region: None },
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["emotion"], "happy");
        assert_eq!(value["face_detected"], true);
        assert!(value.get("face_region").is_none());
        assert_eq!(value["all_emotions"]["neutral"], 0.1);
    }
}
