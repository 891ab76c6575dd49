//! Emotion label vocabularies and the canonical mapping between them
//!
//! The acoustic and linguistic classifiers are trained independently and
//! speak different label sets; fusion is undefined until both are expressed
//! in one space. The [`TaxonomyMapper`] is a total, deterministic table:
//! every raw label from either side maps to exactly one canonical bucket,
//! with no "unknown" fallthrough.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which branch produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Acoustic (voice-tone) branch
    Voice,
    /// Linguistic (transcribed-text) branch
    Text,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voice => write!(f, "voice"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Labels emitted by the acoustic classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceEmotion {
    Angry,
    Sad,
    Happy,
    Neutral,
    Fearful,
}

impl VoiceEmotion {
    /// Every label the acoustic taxonomy defines
    pub const ALL: [Self; 5] = [
        Self::Angry,
        Self::Sad,
        Self::Happy,
        Self::Neutral,
        Self::Fearful,
    ];

    /// Wire-format name of the label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Fearful => "fearful",
        }
    }
}

impl fmt::Display for VoiceEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceEmotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::ClassifierUnavailable(format!("unknown voice emotion label {s:?}"))
            })
    }
}

/// Labels emitted by the text classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEmotion {
    Anger,
    Sadness,
    Joy,
    Fear,
    Disgust,
    Surprise,
    Neutral,
}

impl TextEmotion {
    /// Every label the linguistic taxonomy defines
    pub const ALL: [Self; 7] = [
        Self::Anger,
        Self::Sadness,
        Self::Joy,
        Self::Fear,
        Self::Disgust,
        Self::Surprise,
        Self::Neutral,
    ];

    /// Wire-format name of the label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anger => "anger",
            Self::Sadness => "sadness",
            Self::Joy => "joy",
            Self::Fear => "fear",
            Self::Disgust => "disgust",
            Self::Surprise => "surprise",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for TextEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEmotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::ClassifierUnavailable(format!("unknown text emotion label {s:?}"))
            })
    }
}

/// Shared emotion space both taxonomies map into before fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalEmotion {
    Anger,
    Sadness,
    Joy,
    Fear,
    Neutral,
}

impl CanonicalEmotion {
    /// Every canonical bucket
    pub const ALL: [Self; 5] = [
        Self::Anger,
        Self::Sadness,
        Self::Joy,
        Self::Fear,
        Self::Neutral,
    ];

    /// Wire-format name of the bucket
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anger => "anger",
            Self::Sadness => "sadness",
            Self::Joy => "joy",
            Self::Fear => "fear",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for CanonicalEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalEmotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::ConfigInvalid(format!("unknown canonical emotion {s:?}")))
    }
}

/// Total mapping from both raw taxonomies into the canonical space
///
/// Built once at configuration time. The residual text-only categories
/// default to their nearest canonical neighbor (disgust shares anger's
/// hostile valence, surprise leans positive into joy); both defaults can be
/// overridden through configuration when a deployment disagrees.
#[derive(Debug, Clone)]
pub struct TaxonomyMapper {
    voice: [CanonicalEmotion; VoiceEmotion::ALL.len()],
    text: [CanonicalEmotion; TextEmotion::ALL.len()],
}

impl TaxonomyMapper {
    /// Build the default mapping table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            voice: [
                CanonicalEmotion::Anger,   // angry
                CanonicalEmotion::Sadness, // sad
                CanonicalEmotion::Joy,     // happy
                CanonicalEmotion::Neutral, // neutral
                CanonicalEmotion::Fear,    // fearful
            ],
            text: [
                CanonicalEmotion::Anger,   // anger
                CanonicalEmotion::Sadness, // sadness
                CanonicalEmotion::Joy,     // joy
                CanonicalEmotion::Fear,    // fear
                CanonicalEmotion::Anger,   // disgust (nearest neighbor)
                CanonicalEmotion::Joy,     // surprise (nearest neighbor)
                CanonicalEmotion::Neutral, // neutral
            ],
        }
    }

    /// Redirect one acoustic label to a different canonical bucket
    pub const fn override_voice(&mut self, raw: VoiceEmotion, canonical: CanonicalEmotion) {
        self.voice[raw as usize] = canonical;
    }

    /// Redirect one linguistic label to a different canonical bucket
    pub const fn override_text(&mut self, raw: TextEmotion, canonical: CanonicalEmotion) {
        self.text[raw as usize] = canonical;
    }

    /// Canonical bucket for an acoustic label
    #[must_use]
    pub const fn canonicalize_voice(&self, raw: VoiceEmotion) -> CanonicalEmotion {
        self.voice[raw as usize]
    }

    /// Canonical bucket for a linguistic label
    #[must_use]
    pub const fn canonicalize_text(&self, raw: TextEmotion) -> CanonicalEmotion {
        self.text[raw as usize]
    }

    /// Canonicalize a raw wire-format label from either branch
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassifierUnavailable`] if the label is outside the
    /// source's defined taxonomy (a service protocol violation, not a
    /// mapping gap - defined labels always map)
    pub fn canonicalize(&self, source: Source, raw_label: &str) -> Result<CanonicalEmotion> {
        match source {
            Source::Voice => Ok(self.canonicalize_voice(raw_label.parse()?)),
            Source::Text => Ok(self.canonicalize_text(raw_label.parse()?)),
        }
    }

    /// All (raw, canonical) pairs, for the `mapping` CLI subcommand
    #[must_use]
    pub fn entries(&self) -> Vec<(Source, &'static str, CanonicalEmotion)> {
        VoiceEmotion::ALL
            .into_iter()
            .map(|v| (Source::Voice, v.as_str(), self.canonicalize_voice(v)))
            .chain(
                TextEmotion::ALL
                    .into_iter()
                    .map(|t| (Source::Text, t.as_str(), self.canonicalize_text(t))),
            )
            .collect()
    }
}

impl Default for TaxonomyMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_total() {
        let mapper = TaxonomyMapper::new();

        // Exhaustive enumeration: every defined raw label canonicalizes
        for voice in VoiceEmotion::ALL {
            let _ = mapper.canonicalize(Source::Voice, voice.as_str()).unwrap();
        }
        for text in TextEmotion::ALL {
            let _ = mapper.canonicalize(Source::Text, text.as_str()).unwrap();
        }
    }

    #[test]
    fn test_cross_taxonomy_agreement() {
        let mapper = TaxonomyMapper::new();

        assert_eq!(
            mapper.canonicalize_voice(VoiceEmotion::Happy),
            mapper.canonicalize_text(TextEmotion::Joy),
        );
        assert_eq!(
            mapper.canonicalize_voice(VoiceEmotion::Angry),
            mapper.canonicalize_text(TextEmotion::Anger),
        );
        assert_eq!(
            mapper.canonicalize_voice(VoiceEmotion::Fearful),
            mapper.canonicalize_text(TextEmotion::Fear),
        );
    }

    #[test]
    fn test_residual_defaults() {
        let mapper = TaxonomyMapper::new();

        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Disgust),
            CanonicalEmotion::Anger
        );
        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Surprise),
            CanonicalEmotion::Joy
        );
    }

    #[test]
    fn test_override() {
        let mut mapper = TaxonomyMapper::new();
        mapper.override_text(TextEmotion::Surprise, CanonicalEmotion::Fear);

        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Surprise),
            CanonicalEmotion::Fear
        );
        // Other entries untouched
        assert_eq!(
            mapper.canonicalize_text(TextEmotion::Joy),
            CanonicalEmotion::Joy
        );
    }

    #[test]
    fn test_label_parsing_case_insensitive() {
        assert_eq!("HAPPY".parse::<VoiceEmotion>().unwrap(), VoiceEmotion::Happy);
        assert_eq!(" Surprise ".parse::<TextEmotion>().unwrap(), TextEmotion::Surprise);
        assert!("ecstatic".parse::<VoiceEmotion>().is_err());
    }
}
