//! Attune - real-time affect sensing for voice assistants
//!
//! This library continuously listens to a live audio stream, slices it into
//! fixed-duration clips, and produces one confidence-scored emotional
//! classification per clip by reconciling two independent judgments: an
//! acoustic (voice-tone) signal and a linguistic (transcribed-text) signal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  CaptureLoop (clip n)                │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ ClipBuffer
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!     ┌────────────────┐         ┌──────────────────┐
//!     │  Voice branch   │         │   Text branch    │
//!     │  tone classifier│         │  STT → classifier│
//!     └────────┬───────┘         └────────┬─────────┘
//!              │   TaxonomyMapper (canonical space)
//!              └─────────────┬─────────────┘
//!                            ▼
//!                   ┌────────────────┐
//!                   │  FusionEngine  │
//!                   └────────┬───────┘
//!                            ▼
//!              ReorderBuffer → ResultSink (ordered)
//! ```
//!
//! Capture of clip n+1 starts as soon as clip n is handed off; branch and
//! fusion work for earlier clips overlaps freely, and the reorder buffer
//! restores sequence order before emission.

pub mod audio;
pub mod classify;
pub mod config;
pub mod emotion;
pub mod error;
pub mod pipeline;

pub use audio::{CaptureLoop, CaptureSource, ClipBuffer, MicSource, SimSource};
pub use config::Config;
pub use emotion::{
    CanonicalEmotion, EmotionObservation, FusedResult, FusionEngine, FusionWeights, Source,
    TaxonomyMapper, TextEmotion, VoiceEmotion,
};
pub use error::{Error, Result};
pub use pipeline::{ConsoleSink, Pipeline, ResultSink, Stages, WebhookSink};
