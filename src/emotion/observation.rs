//! Per-branch emotion observations

use serde::Serialize;

use super::taxonomy::{CanonicalEmotion, Source, TaxonomyMapper, TextEmotion, VoiceEmotion};

/// One branch's judgment for one clip
///
/// Immutable after creation; the raw label is retained alongside its
/// canonical bucket so fused results stay explainable.
#[derive(Debug, Clone, Serialize)]
pub struct EmotionObservation {
    /// Which branch produced this observation
    pub source: Source,
    /// Label as emitted by the classifier, in its own vocabulary
    pub raw_label: String,
    /// The label expressed in the canonical space
    pub canonical: CanonicalEmotion,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    /// Sequence number of the originating clip
    pub seq: u64,
}

impl EmotionObservation {
    /// Build a voice-branch observation, canonicalizing through `mapper`
    #[must_use]
    pub fn voice(seq: u64, label: VoiceEmotion, confidence: f32, mapper: &TaxonomyMapper) -> Self {
        Self {
            source: Source::Voice,
            raw_label: label.as_str().to_string(),
            canonical: mapper.canonicalize_voice(label),
            confidence: confidence.clamp(0.0, 1.0),
            seq,
        }
    }

    /// Build a text-branch observation, canonicalizing through `mapper`
    #[must_use]
    pub fn text(seq: u64, label: TextEmotion, confidence: f32, mapper: &TaxonomyMapper) -> Self {
        Self {
            source: Source::Text,
            raw_label: label.as_str().to_string(),
            canonical: mapper.canonicalize_text(label),
            confidence: confidence.clamp(0.0, 1.0),
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        let mapper = TaxonomyMapper::new();
        let obs = EmotionObservation::voice(0, VoiceEmotion::Happy, 1.4, &mapper);
        assert!((obs.confidence - 1.0).abs() < f32::EPSILON);

        let obs = EmotionObservation::text(0, TextEmotion::Fear, -0.2, &mapper);
        assert!(obs.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_raw_label_retained() {
        let mapper = TaxonomyMapper::new();
        let obs = EmotionObservation::text(2, TextEmotion::Disgust, 0.7, &mapper);

        assert_eq!(obs.raw_label, "disgust");
        assert_eq!(obs.canonical, CanonicalEmotion::Anger);
        assert_eq!(obs.seq, 2);
    }
}
