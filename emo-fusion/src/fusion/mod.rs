// Fusion Engine - Confidence-Weighted Distribution Fusion
//
// Combines the emotion distributions of several modalities into one.
// Pure: no I/O, no clock, no logging.

use emo_common::emotion::dominant_emotion;
use emo_common::{EmotionDistribution, Modality, ModalityResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const NORMALIZED_TOLERANCE: f64 = 1e-9;

/// Per-modality fusion weight (any non-negative value; normalized internally)
pub type Weights = BTreeMap<Modality, f64>;

/// Strategy tag recorded on every fused result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Each modality weighted by its reported confidence
    WeightedByConfidence,
    /// Every modality weighted 1/N
    EqualWeights,
}

/// Fusion failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FusionError {
    #[error("No modality results to fuse")]
    NoResults,

    #[error("All modality distributions are empty")]
    EmptyDistribution,
}

/// Output of [`fuse`]
#[derive(Debug, Clone, PartialEq)]
pub struct Fusion {
    pub final_emotion: String,
    pub final_confidence: f64,
    /// Fused distribution, sums to 1
    pub distribution: EmotionDistribution,
    /// Modalities that took part, in canonical order
    pub contributing_modalities: Vec<Modality>,
    pub method: FusionMethod,
}

/// Fuse per-modality results into one distribution and a dominant label
///
/// # Arguments
/// * `results` - One result per participating modality
/// * `weights` - Per-modality weights; `None` means equal weights. A
///   modality without an entry gets weight 0; negative or non-finite weights
///   count as 0; if every weight is 0 all modalities are weighted equally.
///
/// Each distribution is scaled by its normalized weight and accumulated over
/// the union of labels (a label missing from one modality contributes 0 from
/// it). The fused distribution is renormalized to sum to 1. The dominant
/// emotion is the highest-scoring label; ties go to the label that sorts
/// first.
pub fn fuse(
    results: &BTreeMap<Modality, ModalityResult>,
    weights: Option<&Weights>,
) -> Result<Fusion, FusionError> {
    if results.is_empty() {
        return Err(FusionError::NoResults);
    }

    let method = match weights {
        Some(_) => FusionMethod::WeightedByConfidence,
        None => FusionMethod::EqualWeights,
    };
    let normalized = normalize_weights(results.keys().copied(), weights);

    let mut fused = EmotionDistribution::new();
    for (modality, result) in results {
        let weight = normalized.get(modality).copied().unwrap_or(0.0);
        for (label, score) in &result.distribution {
            *fused.entry(label.clone()).or_insert(0.0) += score * weight;
        }
    }

    if fused.is_empty() {
        return Err(FusionError::EmptyDistribution);
    }

    normalize_distribution(&mut fused);

    let (final_emotion, final_confidence) = dominant_emotion(&fused)
        .map(|(label, score)| (label.to_string(), score))
        .ok_or(FusionError::EmptyDistribution)?;

    Ok(Fusion {
        final_emotion,
        final_confidence,
        distribution: fused,
        contributing_modalities: results.keys().copied().collect(),
        method,
    })
}

/// Normalize weights over the participating modalities so they sum to 1
fn normalize_weights(
    modalities: impl Iterator<Item = Modality>,
    weights: Option<&Weights>,
) -> Weights {
    let raw: Weights = modalities
        .map(|m| {
            let w = match weights {
                Some(weights) => weights.get(&m).copied().unwrap_or(0.0),
                None => 1.0,
            };
            (m, if w.is_finite() && w > 0.0 { w } else { 0.0 })
        })
        .collect();

    let total: f64 = raw.values().sum();
    if total > 0.0 {
        raw.into_iter().map(|(m, w)| (m, w / total)).collect()
    } else {
        let equal = 1.0 / raw.len() as f64;
        raw.into_keys().map(|m| (m, equal)).collect()
    }
}

/// Scale so the scores sum to 1; an all-zero distribution becomes uniform
///
/// Distributions already within rounding of 1 are left untouched.
fn normalize_distribution(distribution: &mut EmotionDistribution) {
    let total: f64 = distribution.values().sum();
    if (total - 1.0).abs() <= NORMALIZED_TOLERANCE {
        return;
    }
    if total > 0.0 && total.is_finite() {
        for score in distribution.values_mut() {
            *score /= total;
        }
    } else {
        let uniform = 1.0 / distribution.len() as f64;
        for score in distribution.values_mut() {
            *score = uniform;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emo_common::ModalityMetadata;

    const EPS: f64 = 1e-9;

    fn result(modality: Modality, confidence: f64, pairs: &[(&str, f64)]) -> ModalityResult {
        let distribution: EmotionDistribution =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let dominant = dominant_emotion(&distribution).unwrap().0.to_string();
        let metadata = match modality {
            Modality::Facial => ModalityMetadata::Facial {
                face_detected: true,
                face_region: None,
            },
            Modality::Voice => ModalityMetadata::Voice {
                audio_duration: 2.0,
                sample_rate: 16000,
            },
            Modality::Text => ModalityMetadata::Text {
                text_length: 20,
                detected_language: "en".to_string(),
            },
        };
        ModalityResult {
            dominant_emotion: dominant,
            confidence,
            distribution,
            processing_time: 0.01,
            metadata,
        }
    }

    fn confidence_weights(results: &BTreeMap<Modality, ModalityResult>) -> Weights {
        results.iter().map(|(m, r)| (*m, r.confidence)).collect()
    }

    fn total(d: &EmotionDistribution) -> f64 {
        d.values().sum()
    }

    #[test]
    fn test_empty_results_rejected() {
        assert_eq!(fuse(&BTreeMap::new(), None), Err(FusionError::NoResults));
    }

    #[test]
    fn test_single_modality_passes_through() {
        let mut results = BTreeMap::new();
        results.insert(
            Modality::Facial,
            result(Modality::Facial, 0.6, &[("happy", 0.6), ("neutral", 0.3), ("sad", 0.1)]),
        );

        let fusion = fuse(&results, Some(&confidence_weights(&results))).unwrap();

        assert_eq!(fusion.distribution, results[&Modality::Facial].distribution);
        assert_eq!(fusion.final_emotion, "happy");
        assert!((fusion.final_confidence - 0.6).abs() < EPS);
        assert_eq!(fusion.contributing_modalities, vec![Modality::Facial]);
        assert_eq!(fusion.method, FusionMethod::WeightedByConfidence);
    }

    #[test]
    fn test_text_and_voice_weighted_by_confidence() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Text, result(Modality::Text, 0.7, &[("happy", 0.7), ("sad", 0.3)]));
        results.insert(Modality::Voice, result(Modality::Voice, 0.3, &[("happy", 0.2), ("sad", 0.8)]));

        let fusion = fuse(&results, Some(&confidence_weights(&results))).unwrap();

        assert!((fusion.distribution["happy"] - 0.55).abs() < EPS);
        assert!((fusion.distribution["sad"] - 0.45).abs() < EPS);
        assert_eq!(fusion.final_emotion, "happy");
        assert!((fusion.final_confidence - 0.55).abs() < EPS);
        assert_eq!(fusion.contributing_modalities, vec![Modality::Voice, Modality::Text]);
    }

    #[test]
    fn test_label_only_in_low_weight_modality() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.9, &[("happy", 0.8), ("neutral", 0.2)]));
        results.insert(Modality::Voice, result(Modality::Voice, 0.1, &[("fear", 0.6), ("happy", 0.4)]));

        let fusion = fuse(&results, Some(&confidence_weights(&results))).unwrap();

        // fear only appears in voice: 0.1 * 0.6
        assert!((fusion.distribution["fear"] - 0.06).abs() < EPS);
        assert!((fusion.distribution["happy"] - (0.9 * 0.8 + 0.1 * 0.4)).abs() < EPS);
        assert!((fusion.distribution["neutral"] - 0.18).abs() < EPS);
    }

    #[test]
    fn test_omitted_weights_are_equal() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.9, &[("angry", 1.0)]));
        results.insert(Modality::Text, result(Modality::Text, 0.1, &[("calm", 1.0)]));

        let fusion = fuse(&results, None).unwrap();

        assert_eq!(fusion.method, FusionMethod::EqualWeights);
        assert!((fusion.distribution["angry"] - 0.5).abs() < EPS);
        assert!((fusion.distribution["calm"] - 0.5).abs() < EPS);
        // Tie resolves lexically
        assert_eq!(fusion.final_emotion, "angry");
    }

    #[test]
    fn test_zero_total_weight_falls_back_to_equal() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.0, &[("happy", 1.0)]));
        results.insert(Modality::Voice, result(Modality::Voice, 0.0, &[("sad", 1.0)]));

        let fusion = fuse(&results, Some(&confidence_weights(&results))).unwrap();

        assert!((fusion.distribution["happy"] - 0.5).abs() < EPS);
        assert!((fusion.distribution["sad"] - 0.5).abs() < EPS);
        assert_eq!(fusion.final_emotion, "happy");
    }

    #[test]
    fn test_missing_and_invalid_weights_count_as_zero() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.5, &[("happy", 1.0)]));
        results.insert(Modality::Voice, result(Modality::Voice, 0.5, &[("sad", 1.0)]));
        results.insert(Modality::Text, result(Modality::Text, 0.5, &[("fear", 1.0)]));

        let mut weights = Weights::new();
        weights.insert(Modality::Voice, -3.0);
        weights.insert(Modality::Text, f64::NAN);
        weights.insert(Modality::Facial, 2.0);

        let fusion = fuse(&results, Some(&weights)).unwrap();

        assert!((fusion.distribution["happy"] - 1.0).abs() < EPS);
        assert_eq!(fusion.distribution["sad"], 0.0);
        assert_eq!(fusion.distribution["fear"], 0.0);
        // Zero-weight modalities still count as contributing
        assert_eq!(fusion.contributing_modalities.len(), 3);
    }

    #[test]
    fn test_unnormalized_inputs_sum_to_one() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.8, &[("happy", 0.9), ("surprise", 0.7)]));
        results.insert(Modality::Voice, result(Modality::Voice, 0.4, &[("sad", 0.2), ("angry", 0.05)]));
        results.insert(Modality::Text, result(Modality::Text, 0.6, &[("neutral", 0.3)]));

        let fusion = fuse(&results, Some(&confidence_weights(&results))).unwrap();

        assert!((total(&fusion.distribution) - 1.0).abs() < 1e-6);
        assert_eq!(fusion.distribution.len(), 5);
        assert_eq!(fusion.final_emotion, "happy");
    }

    #[test]
    fn test_all_zero_scores_become_uniform() {
        let mut results = BTreeMap::new();
        results.insert(Modality::Facial, result(Modality::Facial, 0.5, &[("happy", 0.0), ("sad", 0.0)]));

        let fusion = fuse(&results, None).unwrap();

        assert!((fusion.distribution["happy"] - 0.5).abs() < EPS);
        assert!((fusion.distribution["sad"] - 0.5).abs() < EPS);
        assert_eq!(fusion.final_emotion, "happy");
    }

    #[test]
    fn test_fusion_method_tags() {
        assert_eq!(
            serde_json::to_value(FusionMethod::WeightedByConfidence).unwrap(),
            "weighted_by_confidence"
        );
        assert_eq!(serde_json::to_value(FusionMethod::EqualWeights).unwrap(), "equal_weights");
    }
}
