//! Error types for the attune pipeline

use thiserror::Error;

/// Result type alias for attune operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the affect sensing pipeline
///
/// Variants split into fatal conditions (`CaptureUnavailable`,
/// `ConfigInvalid`, `SequenceMismatch`) that halt the pipeline and per-clip
/// recoverable conditions that trigger degraded fusion or a discarded window.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error detected before the capture loop starts
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    /// Capture source lost (device unplugged, stream error) - fatal
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// A capture window could not be fully populated and was discarded
    #[error("partial window discarded at clip {seq}: {reason}")]
    PartialWindowDiscarded {
        /// Sequence number of the discarded window
        seq: u64,
        /// What went wrong with the window
        reason: String,
    },

    /// Transcription service failure - text branch skipped for this clip
    #[error("transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    /// Emotion classifier failure - that branch skipped for this clip
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Observations from different clips were paired - internal invariant violation
    #[error("sequence mismatch: voice observation from clip {voice}, text observation from clip {text}")]
    SequenceMismatch {
        /// Sequence number carried by the voice observation
        voice: u64,
        /// Sequence number carried by the text observation
        text: u64,
    },

    /// Audio encoding or device negotiation error
    #[error("audio error: {0}")]
    Audio(String),

    /// Result sink delivery failure
    #[error("sink error: {0}")]
    Sink(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must halt the whole pipeline
    ///
    /// Per-clip failures (transcription, classifiers, partial windows) are
    /// recoverable; capture loss, bad configuration, and sequence pairing
    /// bugs are not.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid(_) | Self::CaptureUnavailable(_) | Self::SequenceMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::CaptureUnavailable("gone".to_string()).is_fatal());
        assert!(Error::ConfigInvalid("weights".to_string()).is_fatal());
        assert!(Error::SequenceMismatch { voice: 1, text: 2 }.is_fatal());

        assert!(!Error::TranscriptionUnavailable("timeout".to_string()).is_fatal());
        assert!(!Error::ClassifierUnavailable("503".to_string()).is_fatal());
        assert!(
            !Error::PartialWindowDiscarded {
                seq: 7,
                reason: "under-run".to_string()
            }
            .is_fatal()
        );
    }
}
