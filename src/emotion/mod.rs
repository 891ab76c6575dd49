//! Emotion taxonomies, canonical mapping, and decision fusion

mod fusion;
mod observation;
mod taxonomy;

pub use fusion::{FusedResult, FusionEngine, FusionWeights};
pub use observation::EmotionObservation;
pub use taxonomy::{CanonicalEmotion, Source, TaxonomyMapper, TextEmotion, VoiceEmotion};
