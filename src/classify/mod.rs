//! External classification boundaries
//!
//! The transcription service and both emotion models live outside the
//! crate; each is reached through a trait so the pipeline can be exercised
//! with fakes in tests.

mod text;
mod transcribe;
mod voice;

pub use text::{HttpTextClassifier, TextEmotionClassifier};
pub use transcribe::{SpeechToText, TranscriptionAdapter};
pub use voice::{HttpVoiceClassifier, VoiceEmotionClassifier};
