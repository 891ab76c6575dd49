//! Confidence-weighted fusion of voice and text observations

use serde::Serialize;

use crate::{Error, Result};

use super::observation::EmotionObservation;
use super::taxonomy::CanonicalEmotion;

/// Tolerance when checking that weights sum to 1.0
const WEIGHT_EPSILON: f32 = 1e-3;

/// Relative weight of each branch in the fused score
///
/// Voice is weighted above text by default: wording can mask tone, so the
/// acoustic signal is treated as primary for affect.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FusionWeights {
    /// Weight of the acoustic branch
    pub voice: f32,
    /// Weight of the linguistic branch
    pub text: f32,
}

impl FusionWeights {
    /// Default voice-primary split
    pub const DEFAULT: Self = Self {
        voice: 0.6,
        text: 0.4,
    };

    /// Build a validated weight pair
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] unless both weights are in [0, 1]
    /// and sum to 1.0
    pub fn new(voice: f32, text: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&voice) || !(0.0..=1.0).contains(&text) {
            return Err(Error::ConfigInvalid(format!(
                "fusion weights must be in [0, 1], got voice={voice} text={text}"
            )));
        }
        if (voice + text - 1.0).abs() > WEIGHT_EPSILON {
            return Err(Error::ConfigInvalid(format!(
                "fusion weights must sum to 1.0, got {voice} + {text} = {}",
                voice + text
            )));
        }
        Ok(Self { voice, text })
    }

    /// Sum of both weights (1.0 under the invariant; kept explicit so the
    /// normalization below survives adaptive weighting later)
    #[must_use]
    pub fn total(&self) -> f32 {
        self.voice + self.text
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The fused per-clip classification delivered to the result sink
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    /// Sequence number of the originating clip
    pub seq: u64,
    /// Winning canonical label
    pub label: CanonicalEmotion,
    /// Normalized fused confidence in [0, 1]
    pub confidence: f32,
    /// Whether both branches independently chose the same canonical label
    pub agreement: bool,
    /// True when only one branch contributed (other failed or timed out)
    pub partial: bool,
    /// Acoustic observation, retained for explainability
    pub voice: Option<EmotionObservation>,
    /// Linguistic observation, retained for explainability
    pub text: Option<EmotionObservation>,
}

/// Combines canonicalized branch observations into one [`FusedResult`]
///
/// Stateless apart from its weights; safe to share across concurrent
/// per-clip fusion tasks.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    weights: FusionWeights,
}

impl FusionEngine {
    /// Create an engine with the given weight policy
    #[must_use]
    pub const fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    /// The configured weight policy
    #[must_use]
    pub const fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Fuse the available observations for one clip
    ///
    /// With both observations present this is the weighted-score argmax;
    /// with one missing the surviving branch's full-weight judgment is
    /// passed through flagged `partial` (a missing branch is never
    /// substituted with "neutral").
    ///
    /// # Errors
    ///
    /// Returns [`Error::SequenceMismatch`] if the observations come from
    /// different clips (fail fast - silently pairing wrong clips would
    /// corrupt the output stream), and [`Error::ClassifierUnavailable`] if
    /// neither branch produced anything.
    pub fn fuse(
        &self,
        voice: Option<EmotionObservation>,
        text: Option<EmotionObservation>,
    ) -> Result<FusedResult> {
        match (voice, text) {
            (Some(v), Some(t)) => self.fuse_bimodal(v, t),
            (Some(obs), None) | (None, Some(obs)) => Ok(Self::fuse_degraded(obs)),
            (None, None) => Err(Error::ClassifierUnavailable(
                "no observations to fuse".to_string(),
            )),
        }
    }

    fn fuse_bimodal(&self, v: EmotionObservation, t: EmotionObservation) -> Result<FusedResult> {
        if v.seq != t.seq {
            return Err(Error::SequenceMismatch {
                voice: v.seq,
                text: t.seq,
            });
        }

        let agreement = v.canonical == t.canonical;
        let voice_score = self.weights.voice * v.confidence;
        let text_score = self.weights.text * t.confidence;

        // Only the two observed labels can score nonzero, so the argmax
        // over the canonical space reduces to comparing the branches
        let (label, winning_score) = if agreement {
            (v.canonical, voice_score + text_score)
        } else if voice_score > text_score {
            (v.canonical, voice_score)
        } else if text_score > voice_score {
            (t.canonical, text_score)
        } else if t.confidence > v.confidence {
            // Tied score: prefer the higher individual confidence
            (t.canonical, text_score)
        } else {
            // Still tied: acoustic signal is primary
            (v.canonical, voice_score)
        };

        let confidence = (winning_score / self.weights.total()).clamp(0.0, 1.0);

        tracing::debug!(
            seq = v.seq,
            label = %label,
            confidence,
            agreement,
            voice_label = %v.raw_label,
            text_label = %t.raw_label,
            "fused clip"
        );

        Ok(FusedResult {
            seq: v.seq,
            label,
            confidence,
            agreement,
            partial: false,
            voice: Some(v),
            text: Some(t),
        })
    }

    /// Degraded single-branch fusion: the missing branch's weight is
    /// reassigned to the survivor, so the fused confidence equals the
    /// survivor's own confidence
    fn fuse_degraded(obs: EmotionObservation) -> FusedResult {
        tracing::debug!(
            seq = obs.seq,
            source = %obs.source,
            label = %obs.canonical,
            confidence = obs.confidence,
            "degraded single-branch fusion"
        );

        let (voice, text) = match obs.source {
            super::taxonomy::Source::Voice => (Some(obs.clone()), None),
            super::taxonomy::Source::Text => (None, Some(obs.clone())),
        };

        FusedResult {
            seq: obs.seq,
            label: obs.canonical,
            confidence: obs.confidence,
            agreement: false,
            partial: true,
            voice,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::taxonomy::{TaxonomyMapper, TextEmotion, VoiceEmotion};

    fn mapper() -> TaxonomyMapper {
        TaxonomyMapper::new()
    }

    fn voice_obs(seq: u64, label: VoiceEmotion, conf: f32) -> EmotionObservation {
        EmotionObservation::voice(seq, label, conf, &mapper())
    }

    fn text_obs(seq: u64, label: TextEmotion, conf: f32) -> EmotionObservation {
        EmotionObservation::text(seq, label, conf, &mapper())
    }

    #[test]
    fn test_agreement_scenario() {
        // voice=("happy", 0.9), text=("joy", 0.6), weights=(0.6, 0.4)
        let engine = FusionEngine::new(FusionWeights::new(0.6, 0.4).unwrap());
        let result = engine
            .fuse(
                Some(voice_obs(0, VoiceEmotion::Happy, 0.9)),
                Some(text_obs(0, TextEmotion::Joy, 0.6)),
            )
            .unwrap();

        assert_eq!(result.label, CanonicalEmotion::Joy);
        assert!(result.agreement);
        assert!(!result.partial);
        assert!((result.confidence - 0.78).abs() < 1e-6);
    }

    #[test]
    fn test_disagreement_scenario() {
        // voice=("angry", 0.5), text=("fear", 0.9), weights=(0.5, 0.5)
        let engine = FusionEngine::new(FusionWeights::new(0.5, 0.5).unwrap());
        let result = engine
            .fuse(
                Some(voice_obs(1, VoiceEmotion::Angry, 0.5)),
                Some(text_obs(1, TextEmotion::Fear, 0.9)),
            )
            .unwrap();

        assert_eq!(result.label, CanonicalEmotion::Fear);
        assert!(!result.agreement);
        assert!((result.confidence - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_agreement_holds_for_any_weight_split() {
        for (wv, wt) in [(0.1, 0.9), (0.5, 0.5), (0.9, 0.1)] {
            let engine = FusionEngine::new(FusionWeights::new(wv, wt).unwrap());
            let result = engine
                .fuse(
                    Some(voice_obs(0, VoiceEmotion::Sad, 0.4)),
                    Some(text_obs(0, TextEmotion::Sadness, 0.8)),
                )
                .unwrap();

            assert_eq!(result.label, CanonicalEmotion::Sadness);
            assert!(result.agreement);
        }
    }

    #[test]
    fn test_confidence_bounded() {
        let engine = FusionEngine::new(FusionWeights::default());
        for (vc, tc) in [(0.0, 0.0), (1.0, 1.0), (0.3, 0.9), (1.0, 0.0)] {
            let result = engine
                .fuse(
                    Some(voice_obs(0, VoiceEmotion::Neutral, vc)),
                    Some(text_obs(0, TextEmotion::Anger, tc)),
                )
                .unwrap();
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_tie_break_prefers_higher_individual_confidence() {
        // Equal weighted scores: 0.8 * 0.2 == 0.2 * 0.8, but the text
        // classifier is individually more confident
        let engine = FusionEngine::new(FusionWeights::new(0.8, 0.2).unwrap());
        let result = engine
            .fuse(
                Some(voice_obs(0, VoiceEmotion::Angry, 0.2)),
                Some(text_obs(0, TextEmotion::Fear, 0.8)),
            )
            .unwrap();
        assert_eq!(result.label, CanonicalEmotion::Fear);
    }

    #[test]
    fn test_tie_break_falls_back_to_voice() {
        // Same score and same confidence: the acoustic label wins
        let engine = FusionEngine::new(FusionWeights::new(0.5, 0.5).unwrap());
        let result = engine
            .fuse(
                Some(voice_obs(0, VoiceEmotion::Angry, 0.4)),
                Some(text_obs(0, TextEmotion::Fear, 0.4)),
            )
            .unwrap();
        assert_eq!(result.label, CanonicalEmotion::Anger);

        let result = engine
            .fuse(
                Some(voice_obs(0, VoiceEmotion::Angry, 0.0)),
                Some(text_obs(0, TextEmotion::Fear, 0.0)),
            )
            .unwrap();
        assert_eq!(result.label, CanonicalEmotion::Anger);
    }

    #[test]
    fn test_degraded_voice_only() {
        let engine = FusionEngine::new(FusionWeights::default());
        let result = engine
            .fuse(Some(voice_obs(5, VoiceEmotion::Fearful, 0.7)), None)
            .unwrap();

        assert!(result.partial);
        assert_eq!(result.label, CanonicalEmotion::Fear);
        assert!((result.confidence - 0.7).abs() < f32::EPSILON);
        assert!(result.voice.is_some());
        assert!(result.text.is_none());
    }

    #[test]
    fn test_degraded_text_only() {
        let engine = FusionEngine::new(FusionWeights::default());
        let result = engine
            .fuse(None, Some(text_obs(9, TextEmotion::Surprise, 0.55)))
            .unwrap();

        assert!(result.partial);
        assert_eq!(result.label, CanonicalEmotion::Joy);
        assert!((result.confidence - 0.55).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sequence_mismatch_fails_fast() {
        let engine = FusionEngine::new(FusionWeights::default());
        let err = engine
            .fuse(
                Some(voice_obs(3, VoiceEmotion::Happy, 0.9)),
                Some(text_obs(4, TextEmotion::Joy, 0.9)),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            Error::SequenceMismatch { voice: 3, text: 4 }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_both_missing_is_an_error() {
        let engine = FusionEngine::new(FusionWeights::default());
        assert!(engine.fuse(None, None).is_err());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(FusionWeights::new(0.7, 0.4).is_err());
        assert!(FusionWeights::new(-0.1, 1.1).is_err());
        assert!(FusionWeights::new(0.25, 0.75).is_ok());
    }
}
